//! Base model resolution and the shard-by-shard merge

use crate::merge::adapter::{merge_weight, LoraAdapter};
use crate::merge::MergeError;
use candle_core::Device;
use hf_hub::api::sync::ApiBuilder;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const INDEX_FILE: &str = "model.safetensors.index.json";

/// Non-weight files carried over from the base model when present
const METADATA_FILES: [&str; 7] = [
    "config.json",
    "generation_config.json",
    "tokenizer.json",
    "tokenizer.model",
    "tokenizer_config.json",
    "special_tokens_map.json",
    INDEX_FILE,
];

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Weights that received an adapter delta
    pub merged_tensors: usize,
    /// Shard files written
    pub shards: Vec<String>,
    /// Total size of the output directory's files
    pub output_bytes: u64,
}

#[derive(Deserialize)]
struct ShardIndex {
    weight_map: HashMap<String, String>,
}

/// Local directory for `base`: itself when it is a directory, otherwise a
/// hub model id downloaded into the local cache
///
/// Blocks on network I/O when downloading.
pub fn resolve_base(base: &str, token: Option<String>) -> Result<PathBuf, MergeError> {
    let local = Path::new(base);
    if local.is_dir() {
        return Ok(local.to_path_buf());
    }
    if !base.contains('/') {
        return Err(MergeError::MissingPath(local.to_path_buf()));
    }

    info!("Downloading base model {} from the hub", base);
    let api = ApiBuilder::new().with_token(token).build()?;
    let repo = api.model(base.to_string());
    let listing = repo.info()?;
    let names: Vec<&str> = listing.siblings.iter().map(|s| s.rfilename.as_str()).collect();

    let mut snapshot = None;
    let index = if names.contains(&INDEX_FILE) {
        let path = repo.get(INDEX_FILE)?;
        snapshot = path.parent().map(Path::to_path_buf);
        Some(serde_json::from_str::<ShardIndex>(&fs::read_to_string(&path)?)?)
    } else {
        None
    };

    let mut wanted = select_weight_files(&names, index);
    wanted.extend(
        METADATA_FILES
            .iter()
            .filter(|name| **name != INDEX_FILE && names.contains(*name))
            .map(|name| name.to_string()),
    );

    for name in &wanted {
        let path = repo.get(name)?;
        info!("  fetched {}", name);
        if snapshot.is_none() {
            snapshot = path.parent().map(Path::to_path_buf);
        }
    }

    snapshot.ok_or_else(|| MergeError::NoShards(PathBuf::from(base)))
}

/// Weight files to download from a hub listing
///
/// With a shard index only the shards it maps are wanted, which skips
/// duplicate single-file exports such as `consolidated.safetensors`.
/// Without one, every root-level `*.safetensors`.
fn select_weight_files(listing: &[&str], index: Option<ShardIndex>) -> Vec<String> {
    let names: BTreeSet<String> = match index {
        Some(index) => index.weight_map.into_values().collect(),
        None => listing
            .iter()
            .filter(|name| !name.contains('/') && name.ends_with(".safetensors"))
            .map(|name| name.to_string())
            .collect(),
    };
    names.into_iter().collect()
}

/// Shard file names of the model in `dir`, sorted
///
/// Follows the shard index when there is one, else every `*.safetensors`.
/// Symlinked shards count, as in a hub cache snapshot.
fn shard_names(dir: &Path) -> Result<Vec<String>, MergeError> {
    let index_path = dir.join(INDEX_FILE);
    let names: BTreeSet<String> = if index_path.is_file() {
        let index: ShardIndex = serde_json::from_str(&fs::read_to_string(&index_path)?)?;
        index.weight_map.into_values().collect()
    } else {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".safetensors") && entry.path().is_file() {
                names.insert(name);
            }
        }
        names
    };

    if names.is_empty() {
        return Err(MergeError::NoShards(dir.to_path_buf()));
    }
    Ok(names.into_iter().collect())
}

/// Merge `adapter` into the model in `base_dir`, writing to `output`
///
/// Shards keep their names, so a copied index stays valid. Every adapter
/// pair must land on some base weight.
pub fn merge_model(
    base_dir: &Path,
    adapter: &LoraAdapter,
    output: &Path,
) -> Result<MergeReport, MergeError> {
    if !base_dir.is_dir() {
        return Err(MergeError::MissingPath(base_dir.to_path_buf()));
    }
    let shards = shard_names(base_dir)?;
    fs::create_dir_all(output)?;

    let scale = adapter.config.scale();
    let mut applied: HashSet<String> = HashSet::new();

    for (i, shard) in shards.iter().enumerate() {
        let source = base_dir.join(shard);
        if !source.is_file() {
            return Err(MergeError::MissingPath(source));
        }
        info!("[{}/{}] Merging {}", i + 1, shards.len(), shard);

        let mut tensors = candle_core::safetensors::load(&source, &Device::Cpu)?;
        for (name, weight) in tensors.iter_mut() {
            if let Some((a, b)) = adapter.pair(name) {
                *weight = merge_weight(name, weight, a, b, scale)?;
                applied.insert(name.clone());
            }
        }
        candle_core::safetensors::save(&tensors, output.join(shard))?;
    }

    let mut unused: Vec<&str> = adapter
        .targets()
        .filter(|target| !applied.contains(*target))
        .collect();
    if !unused.is_empty() {
        unused.sort_unstable();
        return Err(MergeError::IncompatibleAdapter(format!(
            "{} adapter weights match nothing in the base model (first: {})",
            unused.len(),
            unused[0]
        )));
    }

    for name in METADATA_FILES {
        let source = base_dir.join(name);
        if source.is_file() {
            fs::copy(&source, output.join(name))?;
        } else if name == "config.json" {
            warn!("Base model has no config.json; output will need one");
        }
    }

    let mut output_bytes = 0;
    for entry in fs::read_dir(output)? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            output_bytes += metadata.len();
        }
    }

    Ok(MergeReport {
        merged_tensors: applied.len(),
        shards,
        output_bytes,
    })
}
