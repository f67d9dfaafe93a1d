use crate::dictionary::LocalDictionary;
use crate::error::{Result, ShardJoinError};
use crate::partition::Partitioner;
use crate::types::{FeatureId, NodeContext, Rank};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Name of the partial output file for `rank`: `<base>_<rank>`.
pub fn partial_path(base: impl AsRef<Path>, rank: Rank) -> PathBuf {
    let mut name = OsString::from(base.as_ref().as_os_str());
    name.push(format!("_{rank}"));
    PathBuf::from(name)
}

/// One line of the weight-feature dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightRecord<'a> {
    pub weight: &'a str,
    pub feature_id: FeatureId,
}

impl<'a> WeightRecord<'a> {
    /// Parse `<weight> <featureId>`. Exactly two whitespace-separated tokens.
    pub fn parse(line: &'a str, path: &Path, line_no: u64) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let (Some(weight), Some(id), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(ShardJoinError::format(
                path,
                line_no,
                line,
                "expected exactly 2 tokens: weight and feature id",
            ));
        };
        let feature_id = id.parse::<FeatureId>().map_err(|_| {
            ShardJoinError::format(path, line_no, line, "feature id is not an integer")
        })?;
        Ok(Self { weight, feature_id })
    }
}

/// Counters reported by a completed join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub lines_read: u64,
    pub lines_emitted: u64,
    /// Lines owned by other ranks.
    pub lines_skipped: u64,
}

/// Streams the weight-feature dataset and joins the lines this rank owns
/// against its [`LocalDictionary`].
///
/// The scan is purely local: lines owned by other ranks are skipped without
/// any message being sent.
pub struct JoinEngine<'a> {
    ctx: NodeContext,
    partitioner: Partitioner,
    dictionary: &'a LocalDictionary,
}

impl<'a> JoinEngine<'a> {
    pub fn new(ctx: NodeContext, partitioner: Partitioner, dictionary: &'a LocalDictionary) -> Self {
        Self {
            ctx,
            partitioner,
            dictionary,
        }
    }

    /// Join `weights` into `<output_base>_<rank>`, truncating it first.
    ///
    /// On error, lines already written stay in the partial file.
    pub fn run(&self, weights: impl AsRef<Path>, output_base: impl AsRef<Path>) -> Result<JoinStats> {
        let weights = weights.as_ref();
        let out_path = partial_path(output_base, self.ctx.rank());

        let input = File::open(weights).map_err(|e| ShardJoinError::io(weights, e))?;
        let output = File::create(&out_path).map_err(|e| ShardJoinError::io(&out_path, e))?;
        let mut writer = BufWriter::new(output);

        let scanned = self.join_into(BufReader::new(input), weights, &mut writer, &out_path);
        let flushed = writer.flush().map_err(|e| ShardJoinError::io(&out_path, e));
        let stats = scanned?;
        flushed?;

        tracing::info!(
            rank = self.ctx.rank(),
            output = %out_path.display(),
            read = stats.lines_read,
            emitted = stats.lines_emitted,
            "join finished"
        );
        Ok(stats)
    }

    /// Core scan over any reader/writer pair. `path` labels input errors,
    /// `out_path` labels write failures.
    pub fn join_into<R: BufRead, W: Write>(
        &self,
        reader: R,
        path: &Path,
        out: &mut W,
        out_path: &Path,
    ) -> Result<JoinStats> {
        let rank = self.ctx.rank();
        let mut stats = JoinStats::default();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx as u64 + 1;
            let line = line.map_err(|e| ShardJoinError::io(path, e))?;
            let record = WeightRecord::parse(&line, path, line_no)?;
            stats.lines_read += 1;

            if !self.partitioner.is_owned_by(record.feature_id, rank) {
                stats.lines_skipped += 1;
                continue;
            }

            let slot = self.partitioner.local_slot(record.feature_id);
            let entry =
                self.dictionary
                    .get(slot)
                    .ok_or_else(|| ShardJoinError::PartitionInconsistency {
                        path: path.to_path_buf(),
                        line: line_no,
                        feature_id: record.feature_id,
                    })?;
            writeln!(out, "{} {}", record.weight, entry)
                .map_err(|e| ShardJoinError::io(out_path, e))?;
            stats.lines_emitted += 1;
        }

        Ok(stats)
    }
}
