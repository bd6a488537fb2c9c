use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, StreamError};

/// Text classifier over a fixed label set. Implementations return one
/// probability distribution per input text, aligned with labels().
#[async_trait]
pub trait Classifier: Send + Sync {
    fn labels(&self) -> &[String];

    async fn predict_proba(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}

/// Multinomial naive Bayes model loaded from a JSON export.
///
/// The export carries log priors per class and log likelihoods per
/// class and vocabulary column. Tokens outside the vocabulary are
/// ignored, matching the usual count-vectorizer behavior.
#[derive(Debug, Deserialize)]
pub struct BayesModel {
    labels: Vec<String>,
    class_log_priors: Vec<f64>,
    vocabulary: HashMap<String, usize>,
    feature_log_probs: Vec<Vec<f64>>,
}

impl BayesModel {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let model: BayesModel = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.labels.is_empty() {
            return Err(StreamError::ClassifierError(
                "model has no labels".to_string(),
            ));
        }
        if self.class_log_priors.len() != self.labels.len()
            || self.feature_log_probs.len() != self.labels.len()
        {
            return Err(StreamError::ClassifierError(format!(
                "model shape mismatch: {} labels, {} priors, {} likelihood rows",
                self.labels.len(),
                self.class_log_priors.len(),
                self.feature_log_probs.len()
            )));
        }
        let vocab_size = self.vocabulary.len();
        for row in &self.feature_log_probs {
            if row.len() != vocab_size {
                return Err(StreamError::ClassifierError(format!(
                    "likelihood row has {} columns, vocabulary has {}",
                    row.len(),
                    vocab_size
                )));
            }
        }
        for (token, column) in &self.vocabulary {
            if *column >= vocab_size {
                return Err(StreamError::ClassifierError(format!(
                    "vocabulary entry '{}' maps to column {} of {}",
                    token, column, vocab_size
                )));
            }
        }
        Ok(())
    }

    fn score(&self, text: &str) -> Vec<f64> {
        let mut log_scores = self.class_log_priors.clone();
        for token in tokenize(text) {
            if let Some(&column) = self.vocabulary.get(&token) {
                for (class, score) in log_scores.iter_mut().enumerate() {
                    *score += self.feature_log_probs[class][column];
                }
            }
        }
        softmax(&log_scores)
    }
}

#[async_trait]
impl Classifier for BayesModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    async fn predict_proba(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        Ok(texts.iter().map(|text| self.score(text)).collect())
    }
}

/// Lowercases and splits on non-alphanumeric runs, keeping tokens of
/// two or more characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(str::to_string)
        .collect()
}

/// Log-sum-exp softmax. Subtracts the max score first so the exps
/// cannot overflow.
fn softmax(log_scores: &[f64]) -> Vec<f64> {
    let max = log_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = log_scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

/// Index and value of the largest probability. The first maximum wins
/// on ties.
pub fn argmax(probs: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &prob) in probs.iter().enumerate() {
        match best {
            Some((_, current)) if prob <= current => {}
            _ => best = Some((index, prob)),
        }
    }
    best
}

/// Shannon entropy of a distribution in nats. Confident predictions
/// score low.
pub fn prediction_entropy(probs: &[f64]) -> f64 {
    probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum()
}
