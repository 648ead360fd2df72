use std::num::NonZeroU32;
use std::pin::pin;

use anyhow::{Context, Result};
use log::{debug, info, trace};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaChatMessage, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;

use crate::editor::EditorCommand;
use crate::script::Script;
use crate::writer::{generate_request, into_command, rewrite_request, ChatMessage, WriteMode};

// ---------------------------------------------------------------------------
// Model configuration
// ---------------------------------------------------------------------------

pub struct ModelConfig {
    /// How many layers to offload to GPU (0 = CPU only).
    pub n_gpu_layers: u32,
    /// Context window size in tokens.
    pub n_ctx: u32,
    /// Maximum tokens to generate per completion.
    pub max_tokens: usize,
    /// Sampling temperature. Script writing wants some variety.
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_gpu_layers: 0,
            n_ctx: 8192,
            max_tokens: 1024,
            temperature: 0.85,
        }
    }
}

fn build_sampler(temperature: f32) -> LlamaSampler {
    LlamaSampler::chain_simple([
        LlamaSampler::penalties(64, 1.1, 0.0, 0.0),
        LlamaSampler::top_k(40),
        LlamaSampler::top_p(0.95, 1),
        LlamaSampler::min_p(0.0, 1),
        LlamaSampler::temp(temperature),
        LlamaSampler::dist(1234),
    ])
}

// ---------------------------------------------------------------------------
// LocalWriter — loaded model handle
// ---------------------------------------------------------------------------

/// Text-generation collaborator backed by a local GGUF model.
///
/// Its output never touches the graph directly: every result is turned into
/// an [`EditorCommand`] for the editor session.
pub struct LocalWriter {
    #[allow(dead_code)]
    backend: &'static LlamaBackend,
    model: &'static LlamaModel,
    ctx: LlamaContext<'static>,
    n_ctx: u32,
    max_tokens: usize,
    temperature: f32,
}

impl LocalWriter {
    pub fn load(model_path: &str, config: ModelConfig) -> Result<Self> {
        let backend: &'static LlamaBackend = Box::leak(Box::new(
            LlamaBackend::init().context("failed to init llama backend")?,
        ));

        info!("Loading model from: {model_path}");
        info!(
            "  config: n_gpu_layers={}, n_ctx={}, max_tokens={}",
            config.n_gpu_layers, config.n_ctx, config.max_tokens
        );

        let model_params = pin!(LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers));
        let model: &'static LlamaModel = Box::leak(Box::new(
            LlamaModel::load_from_file(backend, model_path, &model_params)
                .context("failed to load model")?,
        ));

        let n_ctx = NonZeroU32::new(config.n_ctx).context("n_ctx must be > 0")?;
        let ctx = model
            .new_context(backend, LlamaContextParams::default().with_n_ctx(Some(n_ctx)))
            .context("failed to create inference context")?;

        info!("Model loaded successfully");
        Ok(Self {
            backend,
            model,
            ctx,
            n_ctx: config.n_ctx,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Continue the story. The result is appended to the buffer.
    pub fn generate(&mut self, script: &Script, prompt: &str) -> Result<EditorCommand> {
        let raw = self.complete(&generate_request(script, prompt), self.max_tokens)?;
        Ok(into_command(WriteMode::Generate, &raw))
    }

    /// Polish the whole draft. The result replaces the buffer, so the budget
    /// has to cover the draft itself.
    pub fn rewrite(&mut self, text: &str, instruction: &str) -> Result<EditorCommand> {
        let wanted = self.max_tokens.max(rewrite_budget(text));
        let raw = self.complete(&rewrite_request(text, instruction), wanted)?;
        Ok(into_command(WriteMode::Rewrite, &raw))
    }

    /// Render the chat template and tokenize it.
    fn prompt_tokens(&self, messages: &[ChatMessage]) -> Result<Vec<LlamaToken>> {
        let llama_msgs: Vec<LlamaChatMessage> = messages
            .iter()
            .map(|m| LlamaChatMessage::new(m.role.clone(), m.content.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to create chat messages")?;

        let tmpl = self
            .model
            .chat_template(None)
            .context("model has no chat template")?;
        let prompt = self
            .model
            .apply_chat_template(&tmpl, &llama_msgs, true)
            .context("failed to apply chat template")?;
        trace!("Rendered prompt:\n{prompt}");

        self.model
            .str_to_token(&prompt, AddBos::Always)
            .context("tokenization failed")
    }

    /// Run one request and return the raw script text the model produced.
    fn complete(&mut self, messages: &[ChatMessage], wanted: usize) -> Result<String> {
        for (i, msg) in messages.iter().enumerate() {
            debug!("  msg[{i}] {msg}");
        }
        self.ctx.clear_kv_cache();

        let tokens = self.prompt_tokens(messages)?;
        let budget = token_budget(wanted, tokens.len(), self.n_ctx as usize)
            .context("script does not fit in the model's context window")?;
        info!(
            "Writing with a {}-token prompt, up to {budget} new tokens",
            tokens.len()
        );

        let mut batch = LlamaBatch::new(self.n_ctx as usize, 1);
        let last_idx = (tokens.len() - 1) as i32;
        for (i, tok) in (0i32..).zip(tokens.iter()) {
            batch.add(*tok, i, &[0], i == last_idx)?;
        }
        self.ctx.decode(&mut batch).context("prompt decode failed")?;

        let mut sampler = build_sampler(self.temperature);
        let mut output = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut n_cur = batch.n_tokens();

        for _ in 0..budget {
            let tok = sampler.sample(&self.ctx, batch.n_tokens() - 1);
            sampler.accept(tok);
            if self.model.is_eog_token(tok) {
                break;
            }

            let piece = self
                .model
                .token_to_piece(tok, &mut decoder, true, None)
                .context("token_to_piece failed")?;
            output.push_str(&piece);

            batch.clear();
            batch.add(tok, n_cur, &[0], true)?;
            self.ctx.decode(&mut batch).context("decode step failed")?;
            n_cur += 1;
        }

        debug!("Model output ({} lines):\n{output}", output.lines().count());
        Ok(output)
    }
}

/// Rough token count for a rewritten draft: about one token per CJK
/// character, plus headroom for the added narration.
fn rewrite_budget(text: &str) -> usize {
    let chars = text.chars().count();
    chars + chars / 2
}

/// New tokens that still fit after the prompt. `None` when the prompt is
/// empty or leaves no room at all.
fn token_budget(wanted: usize, prompt_len: usize, n_ctx: usize) -> Option<usize> {
    if prompt_len == 0 {
        return None;
    }
    let room = n_ctx.checked_sub(prompt_len).filter(|&r| r > 0)?;
    Some(wanted.min(room))
}
