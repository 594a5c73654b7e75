//! Evaluator for CatBoost binary classifiers exported with
//! `model.save_model(path, format="json")`.
//!
//! Only symmetric (oblivious) trees over float features are supported, which is
//! what CatBoost produces for numeric inputs by default.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize)]
struct RawModel {
    features_info: RawFeaturesInfo,
    #[serde(default)]
    oblivious_trees: Option<Vec<RawTree>>,
    #[serde(default)]
    scale_and_bias: Option<(f64, Vec<f64>)>,
}

#[derive(Debug, Deserialize)]
struct RawFeaturesInfo {
    #[serde(default)]
    float_features: Vec<RawFloatFeature>,
    #[serde(default)]
    categorical_features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawFloatFeature {
    feature_index: usize,
    #[serde(default)]
    flat_feature_index: Option<usize>,
    #[serde(default)]
    nan_value_treatment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    leaf_values: Vec<f64>,
    splits: Vec<RawSplit>,
}

#[derive(Debug, Deserialize)]
struct RawSplit {
    #[serde(default)]
    split_type: Option<String>,
    #[serde(default)]
    float_feature_index: Option<usize>,
    #[serde(default)]
    border: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NanMode {
    AsIs,
    AsFalse,
    AsTrue,
}

#[derive(Debug, Clone)]
struct Split {
    feature: usize,
    border: f32,
    nan: NanMode,
}

impl Split {
    #[inline]
    fn fires(&self, x: &[f32]) -> bool {
        let v = x[self.feature];
        if v.is_nan() {
            return self.nan == NanMode::AsTrue;
        }
        v > self.border
    }
}

#[derive(Debug, Clone)]
struct Tree {
    splits: Vec<Split>,
    leaves: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct CatBoostModel {
    trees: Vec<Tree>,
    scale: f64,
    bias: f64,
    n_features: usize,
}

impl CatBoostModel {
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let raw: RawModel = serde_json::from_str(text).map_err(|e| Error::InvalidModel(e.to_string()))?;
        if !raw.features_info.categorical_features.is_empty() {
            return Err(Error::InvalidModel("categorical features are not supported".into()));
        }
        let raw_trees = raw
            .oblivious_trees
            .ok_or_else(|| Error::InvalidModel("only oblivious (symmetric) trees are supported".into()))?;

        let floats = &raw.features_info.float_features;
        let lookup = |idx: usize| -> Result<(usize, NanMode), Error> {
            let f = floats
                .iter()
                .find(|f| f.feature_index == idx)
                .ok_or_else(|| Error::InvalidModel(format!("split uses unknown float feature {}", idx)))?;
            let nan = match f.nan_value_treatment.as_deref() {
                None | Some("AsIs") => NanMode::AsIs,
                Some("AsFalse") => NanMode::AsFalse,
                Some("AsTrue") => NanMode::AsTrue,
                Some(other) => return Err(Error::InvalidModel(format!("unknown nan_value_treatment '{}'", other))),
            };
            Ok((f.flat_feature_index.unwrap_or(f.feature_index), nan))
        };

        let mut trees = Vec::with_capacity(raw_trees.len());
        for (t, rt) in raw_trees.into_iter().enumerate() {
            let mut splits = Vec::with_capacity(rt.splits.len());
            for s in &rt.splits {
                if let Some(kind) = s.split_type.as_deref() {
                    if kind != "FloatFeature" {
                        return Err(Error::InvalidModel(format!("tree {}: unsupported split type '{}'", t, kind)));
                    }
                }
                let idx = s
                    .float_feature_index
                    .ok_or_else(|| Error::InvalidModel(format!("tree {}: split without float_feature_index", t)))?;
                let border = s
                    .border
                    .ok_or_else(|| Error::InvalidModel(format!("tree {}: split without border", t)))?;
                let (feature, nan) = lookup(idx)?;
                splits.push(Split { feature, border: border as f32, nan });
            }
            if rt.leaf_values.len() != 1usize << splits.len() {
                return Err(Error::InvalidModel(format!(
                    "tree {}: {} leaves for depth {} (multi-class models are not supported)",
                    t,
                    rt.leaf_values.len(),
                    splits.len()
                )));
            }
            trees.push(Tree { splits, leaves: rt.leaf_values });
        }

        let n_features = floats
            .iter()
            .map(|f| f.flat_feature_index.unwrap_or(f.feature_index) + 1)
            .max()
            .unwrap_or(0);
        let (scale, bias) = match raw.scale_and_bias {
            Some((scale, biases)) => (scale, biases.first().copied().unwrap_or(0.0)),
            None => (1.0, 0.0),
        };
        Ok(Self { trees, scale, bias, n_features })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("cannot read model '{}'", path.display()))?;
        let model = Self::from_json(&text).with_context(|| format!("cannot load model '{}'", path.display()))?;
        Ok(model)
    }

    /// Number of input values the model reads.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for one sample.
    pub fn raw_score(&self, x: &[f32]) -> Result<f64, Error> {
        if x.len() < self.n_features {
            return Err(Error::FeatureLength { got: x.len(), need: self.n_features });
        }
        let mut sum = 0.0f64;
        for tree in &self.trees {
            let mut leaf = 0usize;
            for (depth, split) in tree.splits.iter().enumerate() {
                if split.fires(x) {
                    leaf |= 1 << depth;
                }
            }
            sum += tree.leaves[leaf];
        }
        Ok(self.scale * sum + self.bias)
    }

    /// Probability of the positive (modified) class.
    pub fn predict_proba(&self, x: &[f32]) -> Result<f64, Error> {
        self.raw_score(x).map(sigmoid)
    }
}

#[inline]
fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}
