use crate::sample::DigitSample;

/// Anything that can score a digit against each class.
pub trait Classifier {
    // One score per class, higher is more likely
    fn scores(&self, sample: &DigitSample) -> Vec<f32>;

    fn classify(&self, sample: &DigitSample) -> usize {
        argmax(&self.scores(sample))
    }

    fn classify_batch(&self, samples: &[DigitSample]) -> Vec<usize> {
        samples.iter().map(|s| self.classify(s)).collect()
    }
}

pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[derive(Clone, Debug, PartialEq)]
pub struct Misclassification {
    // Position of the sample in the evaluated slice
    pub index: usize,
    pub predicted: usize,
    pub actual: usize,
    // Score of the predicted class minus the score of the true class
    pub gap: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    pub errors: Vec<Misclassification>,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    /// The `k` mistakes the classifier was most confident about.
    pub fn worst_errors(&self, k: usize) -> Vec<&Misclassification> {
        let mut errors: Vec<&Misclassification> = self.errors.iter().collect();
        errors.sort_by(|a, b| b.gap.total_cmp(&a.gap));
        errors.truncate(k);
        errors
    }
}

// Unlabelled samples are skipped
pub fn evaluate<C: Classifier + ?Sized>(classifier: &C, samples: &[DigitSample]) -> Evaluation {
    let mut evaluation = Evaluation::default();
    for (index, sample) in samples.iter().enumerate() {
        let Some(actual) = sample.label() else {
            continue;
        };
        let scores = classifier.scores(sample);
        let predicted = argmax(&scores);
        evaluation.total += 1;
        if predicted == actual {
            evaluation.correct += 1;
        } else {
            evaluation.errors.push(Misclassification {
                index,
                predicted,
                actual,
                gap: scores[predicted] - scores[actual],
            });
        }
    }
    if evaluation.total == 0 {
        log::warn!("No labelled samples to evaluate");
    }
    evaluation
}
