use crate::data_processing::ToxicityLabel;

pub const VERDICT_PREFIX: &str = "Вердикт нейросети RussianTextClassifier: ";

/// Собирает строку вердикта из предсказанных меток.
///
/// Неизвестные метки отбрасываются. Если кроме "Норма" предсказано что-то ещё,
/// "Норма" убирается.
pub fn verdict<S: AsRef<str>>(predicted: &[S]) -> String {
    let mut texts: Vec<&str> = predicted
        .iter()
        .filter_map(|label| ToxicityLabel::from_tag(label.as_ref()))
        .map(ToxicityLabel::verdict)
        .collect();

    let normal = ToxicityLabel::Normal.verdict();
    if texts.len() > 1 && texts.contains(&normal) {
        texts.retain(|text| *text != normal);
    }

    format!("{VERDICT_PREFIX}{}", texts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_normal_label_is_kept() {
        assert_eq!(
            verdict(&["__label__NORMAL"]),
            "Вердикт нейросети RussianTextClassifier: Норма"
        );
    }

    #[test]
    fn normal_is_dropped_next_to_toxic_labels() {
        assert_eq!(
            verdict(&["__label__INSULT", "__label__NORMAL", "__label__THREAT"]),
            "Вердикт нейросети RussianTextClassifier: Оскорбление или нецензурная брань, Грозное преднамерение"
        );
    }

    #[test]
    fn unknown_labels_are_ignored() {
        assert_eq!(
            verdict(&["__label__SPAM", "__label__OBSCENITY"]),
            "Вердикт нейросети RussianTextClassifier: Вульгарность"
        );
    }

    #[test]
    fn empty_prediction_leaves_only_prefix() {
        assert_eq!(verdict::<&str>(&[]), VERDICT_PREFIX);
    }
}
