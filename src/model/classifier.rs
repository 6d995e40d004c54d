
// Классификатор токсичности: предобученный энкодер BERT, dropout и линейный слой, выдающий
// по логиту на каждую метку. Метки независимы, поэтому вероятности считаются сигмоидой,
// а функция потерь - бинарная кросс-энтропия.

use crate::data_processing::{ToxicityInferenceBatch, ToxicityTrainingBatch};
use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{activation::sigmoid, backend::Backend, Bool, Int, Tensor},
};

use super::{
    bert::{BertConfig, BertModel, BertModelRecord},
    loss::binary_cross_entropy_with_logits,
};

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub bert: BertConfig,
    pub num_labels: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
}

#[derive(Module, Debug)]
pub struct RussianTextClassifier<B: Backend> {
    bert: BertModel<B>,
    dropout: Dropout,
    classifier: Linear<B>,
}

/// Выход прямого прохода при обучении
#[derive(Debug)]
pub struct MultiLabelOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
    pub logits: Tensor<B, 2>,
    pub targets: Tensor<B, 2>,
}

impl ClassifierConfig {
    /// Инициализация модели со случайными весами
    pub fn init<B: Backend>(&self, device: &B::Device) -> RussianTextClassifier<B> {
        self.assemble(self.bert.init(device), device)
    }

    /// Инициализация с предобученным энкодером и новой классификационной головой
    pub fn init_pretrained<B: Backend>(
        &self,
        bert_record: BertModelRecord<B>,
        device: &B::Device,
    ) -> RussianTextClassifier<B> {
        let bert = self.bert.init(device).load_record(bert_record);
        self.assemble(bert, device)
    }

    fn assemble<B: Backend>(&self, bert: BertModel<B>, device: &B::Device) -> RussianTextClassifier<B> {
        RussianTextClassifier {
            bert,
            dropout: DropoutConfig::new(self.dropout).init(),
            classifier: LinearConfig::new(self.bert.hidden_size, self.num_labels).init(device),
        }
    }
}

impl<B: Backend> RussianTextClassifier<B> {
    /// Логиты `[batch, num_labels]`
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        mask_pad: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 2> {
        let device = &self.classifier.devices()[0];

        // Перемещаем тензоры на устройство
        let input_ids = input_ids.to_device(device);
        let token_type_ids = token_type_ids.to_device(device);
        let mask_pad = mask_pad.to_device(device);

        let pooled = self.bert.forward(input_ids, token_type_ids, mask_pad).pooled;
        self.classifier.forward(self.dropout.forward(pooled))
    }

    /// Прямой проход с вычислением функции потерь
    pub fn forward_classification(&self, item: ToxicityTrainingBatch<B>) -> MultiLabelOutput<B> {
        let logits = self.forward(item.input_ids, item.token_type_ids, item.mask_pad);
        let targets = item.labels.to_device(&logits.device());
        let loss = binary_cross_entropy_with_logits(logits.clone(), targets.clone());

        MultiLabelOutput {
            loss,
            logits,
            targets,
        }
    }

    /// Вероятности меток для инференса
    pub fn infer(&self, item: ToxicityInferenceBatch<B>) -> Tensor<B, 2> {
        sigmoid(self.forward(item.input_ids, item.token_type_ids, item.mask_pad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_processing::{tokenizer::tests::test_tokenizer, ToxicCommentItem, ToxicityBatcher};
    use crate::model::bert::tests::tiny_config;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::batcher::Batcher,
        optim::{AdamWConfig, GradientsParams, Optimizer},
        tensor::ElementConversion,
    };
    use std::sync::Arc;

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    fn items() -> Vec<ToxicCommentItem> {
        vec![
            ToxicCommentItem::new("привет мир".into(), vec![0.0, 1.0, 0.0]),
            ToxicCommentItem::new("идиот".into(), vec![1.0, 0.0, 0.0]),
            ToxicCommentItem::new("убьют семью".into(), vec![0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn probabilities_have_one_column_per_label() {
        let device = Default::default();
        let model: RussianTextClassifier<TestBackend> = ClassifierConfig::new(tiny_config(), 3).init(&device);
        let batcher = ToxicityBatcher::<TestBackend>::new(Arc::new(test_tokenizer(6)), device);

        let probabilities = model.infer(batcher.batch(vec!["пиво".to_string(), "жара".to_string()]));

        assert_eq!(probabilities.dims(), [2, 3]);
        let values = probabilities.into_data().convert::<f32>().value;
        assert!(values.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn optimizer_steps_reduce_loss() {
        let device = Default::default();
        let mut model: RussianTextClassifier<TestAutodiffBackend> = ClassifierConfig::new(tiny_config(), 3)
            .with_dropout(0.0)
            .init(&device);
        let batcher = ToxicityBatcher::<TestAutodiffBackend>::new(Arc::new(test_tokenizer(6)), device);
        let mut optim = AdamWConfig::new().init();

        let loss_of = |model: &RussianTextClassifier<TestAutodiffBackend>| -> f32 {
            model
                .forward_classification(batcher.batch(items()))
                .loss
                .into_scalar()
                .elem::<f32>()
        };

        let initial = loss_of(&model);
        for _ in 0..30 {
            let output = model.forward_classification(batcher.batch(items()));
            let grads = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optim.step(1.0e-2, model, grads);
        }

        assert!(loss_of(&model) < initial);
    }
}
