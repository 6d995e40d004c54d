
// Энкодер BERT, реализованный на Burn. Имена полей повторяют структуру весов HuggingFace
// (embeddings / encoder.layer.N / pooler), поэтому предобученные веса загружаются в запись
// BertModelRecord с минимальной переименовкой ключей.

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    tensor::{
        activation::{gelu, softmax},
        backend::Backend,
        Bool, Device, Int, Tensor,
    },
};

/// Архитектура энкодера. Имена полей совпадают с `config.json` моделей BERT.
#[derive(Config, Debug)]
pub struct BertConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
    #[config(default = 0.1)]
    pub attention_probs_dropout_prob: f64,
}

#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    word_embeddings: Embedding<B>,
    position_embeddings: Embedding<B>,
    token_type_embeddings: Embedding<B>,
    layer_norm: LayerNorm<B>,
    dropout: Dropout,
}

#[derive(Module, Debug)]
pub struct BertSelfOutput<B: Backend> {
    dense: Linear<B>,
    layer_norm: LayerNorm<B>,
    dropout: Dropout,
}

#[derive(Module, Debug)]
pub struct BertAttention<B: Backend> {
    query: Linear<B>,
    key: Linear<B>,
    value: Linear<B>,
    output: BertSelfOutput<B>,
    dropout: Dropout,
    n_heads: usize,
    d_head: usize,
}

#[derive(Module, Debug)]
pub struct BertIntermediate<B: Backend> {
    dense: Linear<B>,
}

#[derive(Module, Debug)]
pub struct BertLayer<B: Backend> {
    attention: BertAttention<B>,
    intermediate: BertIntermediate<B>,
    output: BertSelfOutput<B>,
}

#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    layers: Vec<BertLayer<B>>,
}

#[derive(Module, Debug)]
pub struct BertPooler<B: Backend> {
    dense: Linear<B>,
}

#[derive(Module, Debug)]
pub struct BertModel<B: Backend> {
    embeddings: BertEmbeddings<B>,
    encoder: BertEncoder<B>,
    pooler: BertPooler<B>,
}

/// Выход энкодера
#[derive(Debug, Clone)]
pub struct BertOutput<B: Backend> {
    pub hidden_states: Tensor<B, 3>, // [batch, seq, hidden]
    pub pooled: Tensor<B, 2>,        // [batch, hidden], tanh(dense([CLS]))
}

impl BertConfig {
    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn self_output<B: Backend>(&self, d_input: usize, device: &B::Device) -> BertSelfOutput<B> {
        BertSelfOutput {
            dense: LinearConfig::new(d_input, self.hidden_size).init(device),
            layer_norm: self.layer_norm(device),
            dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
        }
    }

    fn layer<B: Backend>(&self, device: &B::Device) -> BertLayer<B> {
        let d_head = self.hidden_size / self.num_attention_heads;
        let linear = || LinearConfig::new(self.hidden_size, self.hidden_size).init(device);

        BertLayer {
            attention: BertAttention {
                query: linear(),
                key: linear(),
                value: linear(),
                output: self.self_output(self.hidden_size, device),
                dropout: DropoutConfig::new(self.attention_probs_dropout_prob).init(),
                n_heads: self.num_attention_heads,
                d_head,
            },
            intermediate: BertIntermediate {
                dense: LinearConfig::new(self.hidden_size, self.intermediate_size).init(device),
            },
            output: self.self_output(self.intermediate_size, device),
        }
    }

    /// Инициализация энкодера со случайными весами
    pub fn init<B: Backend>(&self, device: &B::Device) -> BertModel<B> {
        let embeddings = BertEmbeddings {
            word_embeddings: EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position_embeddings: EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size)
                .init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size)
                .init(device),
            layer_norm: self.layer_norm(device),
            dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
        };
        let layers = (0..self.num_hidden_layers)
            .map(|_| self.layer(device))
            .collect();

        BertModel {
            embeddings,
            encoder: BertEncoder { layers },
            pooler: BertPooler {
                dense: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            },
        }
    }
}

impl<B: Backend> BertEmbeddings<B> {
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, token_type_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_length] = input_ids.dims();
        let device: Device<B> = input_ids.device();

        let index_positions = Tensor::arange(0..seq_length, &device)
            .reshape([1, seq_length])
            .repeat(0, batch_size);

        let embedding = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(index_positions)
            + self.token_type_embeddings.forward(token_type_ids);

        self.dropout.forward(self.layer_norm.forward(embedding))
    }
}

impl<B: Backend> BertSelfOutput<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>, residual: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.dropout.forward(self.dense.forward(hidden));
        self.layer_norm.forward(hidden + residual)
    }
}

impl<B: Backend> BertAttention<B> {
    // [batch, seq, hidden] -> [batch, heads, seq, d_head]
    fn split_heads(&self, x: Tensor<B, 3>, batch_size: usize, seq_length: usize) -> Tensor<B, 4> {
        x.reshape([batch_size, seq_length, self.n_heads, self.d_head])
            .swap_dims(1, 2)
    }

    pub fn forward(&self, hidden: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let [batch_size, seq_length, d_model] = hidden.dims();

        let query = self.split_heads(self.query.forward(hidden.clone()), batch_size, seq_length);
        let key = self.split_heads(self.key.forward(hidden.clone()), batch_size, seq_length);
        let value = self.split_heads(self.value.forward(hidden.clone()), batch_size, seq_length);

        let scores = query
            .matmul(key.swap_dims(2, 3))
            .div_scalar((self.d_head as f32).sqrt());
        // Позиции заполнения не участвуют во внимании
        let scores = scores.mask_fill(mask_pad.reshape([batch_size, 1, 1, seq_length]), -1.0e4);
        let weights = self.dropout.forward(softmax(scores, 3));

        let context = weights
            .matmul(value)
            .swap_dims(1, 2)
            .reshape([batch_size, seq_length, d_model]);

        self.output.forward(context, hidden)
    }
}

impl<B: Backend> BertLayer<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attention = self.attention.forward(hidden, mask_pad);
        let intermediate = gelu(self.intermediate.dense.forward(attention.clone()));
        self.output.forward(intermediate, attention)
    }
}

impl<B: Backend> BertModel<B> {
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        mask_pad: Tensor<B, 2, Bool>,
    ) -> BertOutput<B> {
        let mut hidden = self.embeddings.forward(input_ids, token_type_ids);
        for layer in &self.encoder.layers {
            hidden = layer.forward(hidden, mask_pad.clone());
        }

        // Пулер берёт скрытое состояние токена [CLS]
        let [batch_size, _, hidden_size] = hidden.dims();
        let cls = hidden
            .clone()
            .slice([0..batch_size, 0..1])
            .reshape([batch_size, hidden_size]);
        let pooled = self.pooler.dense.forward(cls).tanh();

        BertOutput {
            hidden_states: hidden,
            pooled,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Data;

    type TestBackend = NdArray;

    pub(crate) fn tiny_config() -> BertConfig {
        BertConfig::new(16, 8, 2, 2, 16, 16)
            .with_hidden_dropout_prob(0.0)
            .with_attention_probs_dropout_prob(0.0)
    }

    fn ids(values: [[i64; 4]; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(Data::<i64, 2>::from(values).convert(),&Default::default())
    }

    #[test]
    fn forward_shapes() {
        let model: BertModel<TestBackend> = tiny_config().init(&Default::default());
        let input_ids = ids([[2, 4, 5, 3], [2, 9, 3, 0]]);
        let mask_pad = input_ids.clone().equal_elem(0);

        let output = model.forward(input_ids, ids([[0; 4]; 2]), mask_pad);

        assert_eq!(output.hidden_states.dims(), [2, 4, 8]);
        assert_eq!(output.pooled.dims(), [2, 8]);
    }

    #[test]
    fn padding_does_not_change_real_tokens() {
        let model: BertModel<TestBackend> = tiny_config().init(&Default::default());

        let short = ids([[2, 9, 3, 0], [2, 9, 3, 0]]);
        let other_pad = ids([[2, 9, 3, 7], [2, 9, 3, 7]]);
        let mask = ids([[0, 0, 0, 1], [0, 0, 0, 1]]).equal_elem(1);

        let a = model.forward(short, ids([[0; 4]; 2]), mask.clone()).pooled;
        let b = model.forward(other_pad, ids([[0; 4]; 2]), mask).pooled;

        a.into_data().assert_approx_eq(&b.into_data(), 4);
    }
}
