//! Adapter loading and the per-weight merge

use crate::merge::MergeError;
use candle_core::{DType, Device, Tensor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "adapter_config.json";
const WEIGHTS_FILE: &str = "adapter_model.safetensors";
const KEY_PREFIX: &str = "base_model.model.";

/// The fields of `adapter_config.json` the merge needs
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdapterConfig {
    /// Adapter rank
    pub r: u32,
    /// Scaling numerator
    pub lora_alpha: f64,
    /// Rank-stabilized scaling (`alpha / sqrt(r)`)
    #[serde(default)]
    pub use_rslora: bool,
}

impl AdapterConfig {
    /// Factor applied to `B · A` before adding it to the weight
    pub fn scale(&self) -> f64 {
        let r = f64::from(self.r.max(1));
        if self.use_rslora {
            self.lora_alpha / r.sqrt()
        } else {
            self.lora_alpha / r
        }
    }
}

/// A loaded adapter: `A`/`B` pairs keyed by the base weight they modify
pub struct LoraAdapter {
    /// Parsed config
    pub config: AdapterConfig,
    pairs: HashMap<String, (Tensor, Tensor)>,
}

impl LoraAdapter {
    /// Load `adapter_config.json` and `adapter_model.safetensors` from `dir`
    pub fn load(dir: &Path) -> Result<Self, MergeError> {
        let config_path = dir.join(CONFIG_FILE);
        let weights_path = dir.join(WEIGHTS_FILE);
        for path in [&config_path, &weights_path] {
            if !path.is_file() {
                return Err(MergeError::MissingPath(path.clone()));
            }
        }

        let config: AdapterConfig = serde_json::from_str(&fs::read_to_string(&config_path)?)?;
        let tensors = candle_core::safetensors::load(&weights_path, &Device::Cpu)?;
        let pairs = pair_tensors(tensors)?;

        debug!(
            "Loaded adapter with {} pairs (r={}, alpha={})",
            pairs.len(),
            config.r,
            config.lora_alpha
        );
        Ok(Self { config, pairs })
    }

    /// Build an adapter from already-loaded tensors
    pub fn from_tensors(
        config: AdapterConfig,
        tensors: HashMap<String, Tensor>,
    ) -> Result<Self, MergeError> {
        Ok(Self {
            config,
            pairs: pair_tensors(tensors)?,
        })
    }

    /// Number of weights this adapter modifies
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the adapter modifies nothing
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The `(A, B)` pair targeting `weight_name`, if any
    pub fn pair(&self, weight_name: &str) -> Option<&(Tensor, Tensor)> {
        self.pairs.get(weight_name)
    }

    /// Names of the base weights this adapter modifies
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }
}

/// Which half of a pair a key holds, and the base weight it targets
fn parse_key(key: &str) -> Option<(String, bool)> {
    let rest = key.strip_prefix(KEY_PREFIX)?;
    if let Some(module) = rest.strip_suffix(".lora_A.weight") {
        Some((format!("{}.weight", module), true))
    } else {
        rest.strip_suffix(".lora_B.weight")
            .map(|module| (format!("{}.weight", module), false))
    }
}

fn pair_tensors(tensors: HashMap<String, Tensor>) -> Result<HashMap<String, (Tensor, Tensor)>, MergeError> {
    let mut halves: HashMap<String, (Option<Tensor>, Option<Tensor>)> = HashMap::new();
    for (key, tensor) in tensors {
        match parse_key(&key) {
            Some((target, true)) => halves.entry(target).or_default().0 = Some(tensor),
            Some((target, false)) => halves.entry(target).or_default().1 = Some(tensor),
            None => warn!("Ignoring adapter tensor {}", key),
        }
    }

    let mut pairs = HashMap::with_capacity(halves.len());
    for (target, half) in halves {
        match half {
            (Some(a), Some(b)) => {
                pairs.insert(target, (a, b));
            }
            _ => {
                return Err(MergeError::IncompatibleAdapter(format!(
                    "{} has only one of lora_A/lora_B",
                    target
                )))
            }
        }
    }
    Ok(pairs)
}

/// `W + scale · (B · A)`, computed in f32 and cast back to `W`'s dtype
pub fn merge_weight(
    name: &str,
    weight: &Tensor,
    a: &Tensor,
    b: &Tensor,
    scale: f64,
) -> Result<Tensor, MergeError> {
    let (rank, in_features) = a.dims2()?;
    let (out_features, b_rank) = b.dims2()?;
    let delta_shape = vec![out_features, in_features];
    if rank != b_rank || weight.dims() != delta_shape.as_slice() {
        return Err(MergeError::ShapeMismatch {
            name: name.to_string(),
            weight: weight.dims().to_vec(),
            delta: delta_shape,
        });
    }

    let delta = b
        .to_dtype(DType::F32)?
        .matmul(&a.to_dtype(DType::F32)?)?
        .affine(scale, 0.0)?;
    let merged = weight.to_dtype(DType::F32)?.add(&delta)?;
    Ok(merged.to_dtype(weight.dtype())?)
}
