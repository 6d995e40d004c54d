
// Загрузка предобученного энкодера с HuggingFace Hub. Файлы кэшируются hf-hub в
// ~/.cache/huggingface/hub, веса PyTorch импортируются в запись Burn через burn-import.

use std::{fs, path::PathBuf};

use burn::{
    record::{FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use serde::Deserialize;

use super::bert::{BertConfig, BertModelRecord};
use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "bert-base-multilingual-cased";

/// Переименование ключей чекпоинта HuggingFace в пути модулей BertModel
const KEY_REMAP: [(&str, &str); 5] = [
    (r"^bert\.", ""),
    (r"encoder\.layer\.([0-9]+)\.", "encoder.layers.$1."),
    (r"attention\.self\.(query|key|value)\.", "attention.$1."),
    (r"\.LayerNorm\.(weight|gamma)$", ".layer_norm.gamma"),
    (r"\.LayerNorm\.(bias|beta)$", ".layer_norm.beta"),
];

/// Локальные пути к файлам модели
#[derive(Debug, Clone)]
pub struct PretrainedFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl PretrainedFiles {
    /// Скачивает (или берёт из кэша) конфиг, токенизатор и веса модели
    pub fn download(model_id: &str) -> Result<Self> {
        tracing::info!(model_id, "fetching pretrained model from HuggingFace Hub");
        let api = hf_hub::api::sync::Api::new()?;
        let repo = api.model(model_id.to_string());

        let files = Self {
            config: repo.get("config.json")?,
            tokenizer: repo.get("tokenizer.json")?,
            weights: repo.get("pytorch_model.bin")?,
        };
        tracing::debug!(?files, "pretrained files ready");
        Ok(files)
    }
}

#[derive(Debug, Deserialize)]
struct HubBertConfig {
    vocab_size: usize,
    hidden_size: usize,
    num_hidden_layers: usize,
    num_attention_heads: usize,
    intermediate_size: usize,
    max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps: f64,
    #[serde(default = "default_dropout")]
    hidden_dropout_prob: f64,
    #[serde(default = "default_dropout")]
    attention_probs_dropout_prob: f64,
    #[serde(default)]
    hidden_act: Option<String>,
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

fn default_dropout() -> f64 {
    0.1
}

/// Читает `config.json` модели BERT
pub fn read_hub_config(json: &str) -> Result<BertConfig> {
    let hub: HubBertConfig = serde_json::from_str(json)?;

    if hub.hidden_size % hub.num_attention_heads != 0 {
        return Err(Error::Config(format!(
            "hidden_size {} is not divisible by num_attention_heads {}",
            hub.hidden_size, hub.num_attention_heads
        )));
    }
    if let Some(act) = hub.hidden_act.as_deref().filter(|act| *act != "gelu") {
        tracing::warn!(act, "encoder uses a different activation, falling back to gelu");
    }

    Ok(BertConfig::new(
        hub.vocab_size,
        hub.hidden_size,
        hub.num_hidden_layers,
        hub.num_attention_heads,
        hub.intermediate_size,
        hub.max_position_embeddings,
    )
    .with_type_vocab_size(hub.type_vocab_size)
    .with_layer_norm_eps(hub.layer_norm_eps)
    .with_hidden_dropout_prob(hub.hidden_dropout_prob)
    .with_attention_probs_dropout_prob(hub.attention_probs_dropout_prob))
}

/// Конфигурация и веса энкодера
pub fn load_encoder<B: Backend>(
    files: &PretrainedFiles,
    device: &B::Device,
) -> Result<(BertConfig, BertModelRecord<B>)> {
    let json = fs::read_to_string(&files.config).map_err(|e| Error::io(&files.config, e))?;
    let config = read_hub_config(&json)?;

    let load_args = KEY_REMAP
        .iter()
        .fold(LoadArgs::new(files.weights.clone()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        });

    tracing::info!(
        weights = %files.weights.display(),
        layers = config.num_hidden_layers,
        hidden = config.hidden_size,
        "importing encoder weights"
    );
    let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(load_args, device)
        .map_err(|e| Error::Record(format!("{e:?}")))?;

    Ok((config, record))
}
