//! On-disk [`ConfigRepository`] (§4.7, §11): loads a compiled rule set
//! written by whatever assembles one from the textual config (out of scope
//! here) and reports file mtimes so a caller can drive
//! [`crate::client::ClientState::should_reload_config`]'s debounce.
//!
//! The on-disk envelope reuses the wire `configuration` message body (§6)
//! for the context list, followed by a stage-boundary table and the
//! exit-gesture sequence: the same binary primitives `kremap_proto` already
//! encodes for the socket, just framed as a whole file instead of a
//! length-prefixed message, so this crate doesn't need a second
//! serialization scheme for the same data.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use kremap_core::domain::repositories::{CompiledRuleSet, ConfigRepository};
use kremap_core::domain::DomainError;
use kremap_core::{Context, Directive};
use kremap_proto::key_seq;
use kremap_proto::message::{decode_configuration, encode_configuration, wire_contexts_to_core, WireContext};

use crate::error::ConfigLoadError;

pub struct FileConfigRepository {
    dir: PathBuf,
}

impl FileConfigRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileConfigRepository { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.kremaprs"))
    }

    /// The file's last-modified time, for feeding a debounced reload check.
    pub fn modified_at(&self, name: &str) -> Result<SystemTime, ConfigLoadError> {
        Ok(fs::metadata(self.path_for(name))?.modified()?)
    }
}

impl ConfigRepository for FileConfigRepository {
    fn load(&self, name: &str) -> Result<CompiledRuleSet, DomainError> {
        let path = self.path_for(name);
        let bytes = fs::read(&path).map_err(|e| {
            log::error!("failed to read rule set {path:?}: {e}");
            DomainError::InvalidRuleSet(e.to_string())
        })?;
        let rule_set = decode_rule_set(&bytes).map_err(|e| {
            log::error!("failed to decode rule set {path:?}: {e}");
            DomainError::InvalidRuleSet(e.to_string())
        })?;
        log::info!("loaded rule set {name:?} from {path:?}");
        Ok(rule_set)
    }

    fn list(&self) -> Result<Vec<String>, DomainError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| DomainError::InvalidRuleSet(e.to_string()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DomainError::InvalidRuleSet(e.to_string()))?;
            if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("kremaprs") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }
}

/// Encodes a [`CompiledRuleSet`] into this repository's on-disk envelope.
/// Used by whatever assembles a rule set from the textual config to write
/// the file `FileConfigRepository::load` later reads back.
pub fn encode_rule_set(stages: &[Vec<Context>], exit_sequence: &kremap_core::KeySequence) -> Vec<u8> {
    let mut boundaries = Vec::new();
    let mut flat = Vec::new();
    for stage in stages {
        flat.extend_from_slice(stage);
        boundaries.push(flat.len() as u32);
    }
    // The last boundary is implied by the context count; drop it to avoid
    // redundancy.
    boundaries.pop();

    let wire: Vec<WireContext> = flat
        .iter()
        .map(|ctx| WireContext {
            inputs: ctx.inputs.iter().map(|r| (r.expression.clone(), r.output_index)).collect(),
            outputs: ctx.outputs.clone(),
            command_outputs: ctx.command_outputs.iter().map(|(idx, seq)| (seq.clone(), *idx)).collect(),
            device_filter: ctx.device_filter.pattern.clone(),
            modifier_filter: ctx.modifier_filter.clone(),
        })
        .collect();

    let mut config_bytes = Vec::new();
    encode_configuration(&wire, &mut config_bytes);

    let mut out = Vec::new();
    out.extend_from_slice(&(config_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&config_bytes);
    out.extend_from_slice(&(boundaries.len() as u32).to_le_bytes());
    for boundary in boundaries {
        out.extend_from_slice(&boundary.to_le_bytes());
    }
    key_seq::encode(exit_sequence, &mut out);
    out
}

fn decode_rule_set(bytes: &[u8]) -> Result<CompiledRuleSet, ConfigLoadError> {
    let mut cursor = 0usize;
    let config_len = key_seq::read_u32(bytes, &mut cursor)
        .map_err(|e| ConfigLoadError::Invalid(e.to_string()))? as usize;
    let config_bytes = bytes
        .get(cursor..cursor + config_len)
        .ok_or_else(|| ConfigLoadError::Invalid("truncated configuration section".to_string()))?;
    cursor += config_len;

    let wire = decode_configuration(config_bytes).map_err(|e| ConfigLoadError::Invalid(e.to_string()))?;
    let contexts = wire_contexts_to_core(wire, &Directive::new(0));

    let n_boundaries = key_seq::read_u32(bytes, &mut cursor)
        .map_err(|e| ConfigLoadError::Invalid(e.to_string()))? as usize;
    let mut boundaries = Vec::with_capacity(n_boundaries);
    for _ in 0..n_boundaries {
        boundaries.push(key_seq::read_u32(bytes, &mut cursor).map_err(|e| ConfigLoadError::Invalid(e.to_string()))? as usize);
    }

    let exit_sequence = key_seq::decode(bytes, &mut cursor).map_err(|e| ConfigLoadError::Invalid(e.to_string()))?;

    let stages = split_into_stages(contexts, &boundaries);
    Ok(CompiledRuleSet { stages, exit_sequence: exit_sequence.as_slice().to_vec() })
}

fn split_into_stages(contexts: Vec<Context>, boundaries: &[usize]) -> Vec<Vec<Context>> {
    if boundaries.is_empty() {
        return vec![contexts];
    }
    let mut stages = Vec::with_capacity(boundaries.len() + 1);
    let mut remaining = contexts;
    let mut prev = 0usize;
    for &boundary in boundaries {
        let split_at = boundary.saturating_sub(prev).min(remaining.len());
        let stage = remaining.drain(..split_at).collect();
        stages.push(stage);
        prev = boundary;
    }
    stages.push(remaining);
    stages
}
