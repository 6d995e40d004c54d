use burn::tensor::{backend::Backend, Tensor};

/// Бинарная кросс-энтропия по логитам, усреднённая по всем ячейкам `[batch, labels]`.
///
/// Считается в устойчивой форме `max(x, 0) - x * y + log(1 + exp(-|x|))`, чтобы большие
/// логиты не переполняли экспоненту.
pub fn binary_cross_entropy_with_logits<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let positive_part = logits.clone().clamp_min(0.0);
    let log_term = logits.clone().abs().neg().exp().add_scalar(1.0).log();

    (positive_part - logits * targets + log_term).mean()
}
