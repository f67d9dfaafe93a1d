use crate::error::{Result, ShardJoinError};
use crate::partition::Partitioner;
use crate::types::{FeatureId, NodeContext};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Rank-local lookup from local slot to the full feature-origin line.
///
/// Holds exactly the features whose owner is this rank. Built once per run and
/// read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct LocalDictionary {
    slots: HashMap<u64, String>,
}

impl LocalDictionary {
    /// Build from a feature-origin file.
    ///
    /// Line 1 is a record-count header and is skipped. Each following line is
    /// `<featureId> <origin...>`; the whole line is retained verbatim.
    pub fn build(
        path: impl AsRef<Path>,
        ctx: &NodeContext,
        partitioner: &Partitioner,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ShardJoinError::io(path, e))?;
        let dict = Self::from_reader(BufReader::new(file), path, ctx, partitioner)?;
        tracing::info!(
            rank = ctx.rank(),
            path = %path.display(),
            entries = dict.len(),
            "local dictionary built"
        );
        Ok(dict)
    }

    /// Build from any buffered reader. `path` is used for error reporting only.
    pub fn from_reader<R: BufRead>(
        reader: R,
        path: &Path,
        ctx: &NodeContext,
        partitioner: &Partitioner,
    ) -> Result<Self> {
        let mut slots = HashMap::new();
        let mut lines = reader.lines();

        // Header: record count, unused.
        if let Some(header) = lines.next() {
            header.map_err(|e| ShardJoinError::io(path, e))?;
        }

        for (idx, line) in lines.enumerate() {
            let line_no = idx as u64 + 2;
            let line = line.map_err(|e| ShardJoinError::io(path, e))?;
            let id = parse_feature_line(&line, path, line_no)?;
            if partitioner.is_owned_by(id, ctx.rank()) {
                slots.insert(partitioner.local_slot(id), line);
            }
        }

        Ok(Self { slots })
    }

    /// Entry stored under a local slot.
    pub fn get(&self, slot: u64) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Extract the feature id from a `<featureId> <origin...>` line.
fn parse_feature_line(line: &str, path: &Path, line_no: u64) -> Result<FeatureId> {
    let mut tokens = line.split_whitespace();
    let (Some(first), Some(_)) = (tokens.next(), tokens.next()) else {
        return Err(ShardJoinError::format(
            path,
            line_no,
            line,
            "expected a feature id followed by its origin",
        ));
    };
    first
        .parse::<FeatureId>()
        .map_err(|_| ShardJoinError::format(path, line_no, line, "feature id is not an integer"))
}
