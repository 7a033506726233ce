use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::{prelude::SliceRandom, Rng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classifier::{argmax, Classifier};
use crate::config::ModelConfig;
use crate::error::{DigitError, Result};
use crate::mnist::one_hot_targets;
use crate::sample::{DigitSample, IMAGE_AREA, IMAGE_SIDE};

const CHUNK_BITS: usize = 32;

// Hyperdimensional digit classifier with binary image encodings and
// integer-valued class accumulators.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegerHDModel {
    // Binary-valued quanta vectors, one per intensity level
    quanta_vectors: Vec<u32>,
    // Binary-valued feature vectors, one per pixel position
    feature_vectors: Vec<u32>,
    // Integer-valued class vectors
    class_vectors: Vec<i32>,
    // Number of chunks in the model's feature vectors (actual dimensionality / 32)
    model_dimensionality_chunks: usize,
    // The actual model dimensionality
    model_dimensionality: usize,
    // Number of features in each input example
    input_dimensionality: usize,
    // Number of values that each input feature can take on
    input_quanta: usize,
    n_classes: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_accuracy: f64,
    pub validation_accuracy: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochStats>,
    // Epoch whose class vectors were kept
    pub best_epoch: usize,
}

/// Human-readable description of a model's layout, stored next to the weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelTopology {
    pub kind: String,
    pub input_shape: [usize; 3],
    pub input_quanta: usize,
    pub dimensionality: usize,
    pub classes: usize,
}

impl IntegerHDModel {
    pub fn new(config: &ModelConfig, input_dimensionality: usize, rng: &mut impl Rng) -> Self {
        let model_dimensionality_chunks = config.dimension_chunks;
        let input_quanta = config.quanta;
        // Compute the actual model dimensionality
        let model_dimensionality = model_dimensionality_chunks * CHUNK_BITS;

        // Allocate space for quanta vectors
        let mut quanta_vectors: Vec<u32> =
            Vec::with_capacity(model_dimensionality_chunks * input_quanta);

        // Randomly generate the first quantum vector
        quanta_vectors.extend((0..model_dimensionality_chunks).map(|_| rng.gen::<u32>()));

        // Randomly order some bits to flip, so that adjacent levels stay similar
        // and the two extremes end up roughly orthogonal
        let mut order_to_flip: Vec<usize> = (0..model_dimensionality).collect();
        order_to_flip.shuffle(rng);
        let flip_per_quantum = model_dimensionality / 2 / (input_quanta - 1).max(1);

        for quantum in 1..input_quanta {
            let quantum_offset_chunks = quantum * model_dimensionality_chunks;
            let previous_quantum_offset_chunks = (quantum - 1) * model_dimensionality_chunks;

            // Copy the previous quanta
            for i in 0..model_dimensionality_chunks {
                quanta_vectors.push(quanta_vectors[previous_quantum_offset_chunks + i]);
            }

            // Flip some bits
            for i in 0..flip_per_quantum {
                let index_to_flip = order_to_flip[i + (quantum - 1) * flip_per_quantum];
                let chunk_to_flip = index_to_flip / CHUNK_BITS;
                let bit_to_flip = index_to_flip % CHUNK_BITS;
                quanta_vectors[quantum_offset_chunks + chunk_to_flip] ^= 1 << bit_to_flip;
            }
        }

        let mut feature_vectors =
            Vec::with_capacity(input_dimensionality * model_dimensionality_chunks);
        feature_vectors.resize_with(input_dimensionality * model_dimensionality_chunks, || {
            rng.gen::<u32>()
        });

        let class_vectors = vec![0_i32; config.classes * model_dimensionality];

        IntegerHDModel {
            quanta_vectors,
            feature_vectors,
            class_vectors,
            model_dimensionality_chunks,
            model_dimensionality,
            input_dimensionality,
            input_quanta,
            n_classes: config.classes,
        }
    }

    pub fn dimensionality(&self) -> usize {
        self.model_dimensionality
    }

    // Map each pixel in [0, 1] onto one of the model's intensity levels
    fn quantize(&self, sample: &DigitSample) -> Vec<usize> {
        let top = (self.input_quanta - 1) as f32;
        sample
            .pixels()
            .iter()
            .map(|&p| (p.clamp(0.0, 1.0) * top).round() as usize)
            .collect()
    }

    // Encode a single image into `output`, which holds one vector's worth of chunks
    fn encode_into(&self, levels: &[usize], output: &mut [u32]) {
        // Bits set in more than half the pixel vectors survive
        let threshold = levels.len() as u32 / 2;
        for (chunk, out) in output.iter_mut().enumerate() {
            // Temporary stack-based scratch space for our majority function
            let mut counts: [u32; CHUNK_BITS] = [0; CHUNK_BITS];
            levels.iter().enumerate().for_each(|(i, &value)| {
                // The vector for a pixel is the position XOR the value
                let xored_chunk = self.feature_vectors[i * self.model_dimensionality_chunks + chunk]
                    ^ self.quanta_vectors[value * self.model_dimensionality_chunks + chunk];
                count_bits_unsigned(xored_chunk, &mut counts);
            });
            *out = binarize_unsigned_chunk(&counts, threshold);
        }
    }

    // Encode a batch of images, back to back
    pub fn encode(&self, samples: &[DigitSample]) -> Vec<u32> {
        let mut output = vec![0_u32; samples.len() * self.model_dimensionality_chunks];
        output
            .par_chunks_mut(self.model_dimensionality_chunks)
            .zip(samples.par_iter())
            .for_each(|(output, sample)| {
                self.encode_into(&self.quantize(sample), output);
            });
        output
    }

    /// Train on labelled samples, keeping the class vectors from the epoch with the
    /// best validation accuracy. Training accuracy stands in when no validation
    /// samples are given.
    pub fn train(
        &mut self,
        train: &[DigitSample],
        validation: &[DigitSample],
        max_epochs: usize,
        patience: usize,
    ) -> Result<TrainingHistory> {
        if train.is_empty() {
            return Err(DigitError::Config("no training samples".into()));
        }
        let labels = class_labels(train)?;
        let validation_labels = class_labels(validation)?;
        let examples = self.encode(train);
        let validation_examples = self.encode(validation);

        // Initial pass: bundle every example into its class
        for (example, &label) in examples
            .chunks(self.model_dimensionality_chunks)
            .zip(labels.iter())
        {
            for i in 0..self.model_dimensionality {
                self.class_vectors[i + label * self.model_dimensionality] += bit_as_i32(example, i);
            }
        }

        let mut history = TrainingHistory::default();
        let mut best = self
            .accuracy_encoded(&validation_examples, &validation_labels)
            .unwrap_or(0.0);
        let mut best_vectors = self.class_vectors.clone();
        let mut epochs_since_improvement = 0;

        for epoch in 1..=max_epochs {
            // Retraining: pull misclassified examples toward their true class
            let mut correct = 0_usize;
            for (example, &label) in examples
                .chunks(self.model_dimensionality_chunks)
                .zip(labels.iter())
            {
                let predicted = self.classify_binary(example);
                if predicted != label {
                    for i in 0..self.model_dimensionality {
                        let bit = bit_as_i32(example, i);
                        self.class_vectors[i + label * self.model_dimensionality] += bit;
                        self.class_vectors[i + predicted * self.model_dimensionality] -= bit;
                    }
                } else {
                    correct += 1;
                }
            }

            let train_accuracy = correct as f64 / labels.len() as f64;
            let validation_accuracy = self
                .accuracy_encoded(&validation_examples, &validation_labels)
                .unwrap_or(train_accuracy);
            log::info!(
                "[Epoch {}] train accuracy: {:.4}, validation accuracy: {:.4}",
                epoch,
                train_accuracy,
                validation_accuracy
            );
            history.epochs.push(EpochStats {
                epoch,
                train_accuracy,
                validation_accuracy,
            });

            if validation_accuracy > best {
                best = validation_accuracy;
                best_vectors.copy_from_slice(&self.class_vectors);
                history.best_epoch = epoch;
                epochs_since_improvement = 0;
            } else {
                epochs_since_improvement += 1;
                if epochs_since_improvement >= patience {
                    log::info!("No improvement for {} epochs, stopping", patience);
                    break;
                }
            }
        }

        self.class_vectors = best_vectors;
        Ok(history)
    }

    // None when there is nothing to measure
    fn accuracy_encoded(&self, examples: &[u32], labels: &[usize]) -> Option<f64> {
        if labels.is_empty() {
            return None;
        }
        let correct = examples
            .par_chunks(self.model_dimensionality_chunks)
            .zip(labels.par_iter())
            .filter(|(example, label)| self.classify_encoded(example) == **label)
            .count();
        Some(correct as f64 / labels.len() as f64)
    }

    fn scores_encoded(&self, input: &[u32]) -> Vec<f32> {
        self.class_vectors
            .chunks(self.model_dimensionality)
            .map(|x| cosine_similarity(input, x) as f32)
            .collect()
    }

    pub fn classify_encoded(&self, input: &[u32]) -> usize {
        argmax(&self.scores_encoded(input))
    }

    // Cheaper decision used while retraining
    pub fn classify_binary(&self, input: &[u32]) -> usize {
        self.class_vectors
            .chunks(self.model_dimensionality)
            .enumerate()
            .min_by_key(|(_, x)| hamming_distance_integer(input, x))
            .map(|(class, _)| class)
            .unwrap_or(0)
    }

    pub fn topology(&self) -> ModelTopology {
        ModelTopology {
            kind: "integer-hd".to_string(),
            input_shape: [IMAGE_SIDE, IMAGE_SIDE, 1],
            input_quanta: self.input_quanta,
            dimensionality: self.model_dimensionality,
            classes: self.n_classes,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        model.check_layout()?;
        Ok(model)
    }

    pub fn save_topology(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.topology())?;
        Ok(())
    }

    // Guard against hand-edited or truncated model files
    fn check_layout(&self) -> Result<()> {
        let chunks = self.model_dimensionality_chunks;
        let consistent = chunks > 0
            && self.input_dimensionality == IMAGE_AREA
            && self.input_quanta >= 2
            && self.model_dimensionality == chunks * CHUNK_BITS
            && self.quanta_vectors.len() == self.input_quanta * chunks
            && self.feature_vectors.len() == self.input_dimensionality * chunks
            && self.class_vectors.len() == self.n_classes * self.model_dimensionality
            && self.n_classes > 0;
        if consistent {
            Ok(())
        } else {
            Err(DigitError::Config("model file has inconsistent vector sizes".into()))
        }
    }
}

impl Classifier for IntegerHDModel {
    fn scores(&self, sample: &DigitSample) -> Vec<f32> {
        let mut encoded = vec![0_u32; self.model_dimensionality_chunks];
        self.encode_into(&self.quantize(sample), &mut encoded);
        self.scores_encoded(&encoded)
    }

    fn classify_batch(&self, samples: &[DigitSample]) -> Vec<usize> {
        self.encode(samples)
            .par_chunks(self.model_dimensionality_chunks)
            .map(|example| self.classify_encoded(example))
            .collect()
    }
}

fn class_labels(samples: &[DigitSample]) -> Result<Vec<usize>> {
    Ok(one_hot_targets(samples)?.iter().map(|v| v.class()).collect())
}

pub fn hamming_distance_integer(binary_vector: &[u32], integer_vector: &[i32]) -> u32 {
    let mut count = 0;
    for (chunk_index, chunk) in binary_vector.iter().enumerate() {
        let chunk_offset = chunk_index << 5;
        let mut chunk_shifting = *chunk;
        for bit_index in (0..32).rev() {
            let integer_value = integer_vector[chunk_offset + bit_index];
            count += ((integer_value as u32) ^ chunk_shifting) >> 31;
            chunk_shifting <<= 1;
        }
    }
    count
}

// Majority function over a list of per-bit counts
fn binarize_unsigned_chunk(counts: &[u32], threshold: u32) -> u32 {
    let mut output = 0;
    for (bit, &count) in counts.iter().enumerate() {
        output |= ((count > threshold) as u32) << bit;
    }
    output
}

// Given a binarized chunk, separate each bit out and add it to an array of counts
fn count_bits_unsigned(chunk: u32, counts: &mut [u32]) {
    for (bit, count) in counts.iter_mut().enumerate() {
        *count += chunk >> bit & 1;
    }
}

fn magnitude(a: &[i32]) -> f64 {
    let square_sum: i64 = a
        .iter()
        .map(|x| {
            let x = *x as i64;
            x * x
        })
        .sum();
    (square_sum as f64).sqrt()
}

// Set bits count as -1, clear bits as +1
fn dot(binary_vec: &[u32], integer_vec: &[i32]) -> i64 {
    let mut sum: i64 = 0;
    for (chunk_index, chunk) in binary_vec.iter().enumerate() {
        let chunk_bit_offset = chunk_index << 5;
        for bit_index in 0..32 {
            let feature_value = integer_vec[bit_index + chunk_bit_offset];
            // Negate by hand rather than multiplying by -1 or 1
            let xor_mask = ((*chunk as i32) << (31 - bit_index)) >> 31;
            let add = xor_mask & 1;
            sum += ((feature_value ^ xor_mask) + add) as i64;
        }
    }
    sum
}

pub fn cosine_similarity(a: &[u32], b: &[i32]) -> f64 {
    let norm = magnitude(b);
    if norm == 0.0 {
        return 0.0;
    }
    (dot(a, b) as f64) / norm
}

// Utility function to get a bit from a vector as -1 or 1
fn bit_as_i32(chunks: &[u32], bit_index: usize) -> i32 {
    let chunk = chunks[bit_index >> 5];
    let bit = bit_index & 31;
    ((chunk as i32) << (31 - bit) >> 31) | 1
}
