//! Topology Reporter
//!
//! Share of the key space owned by each open shard, for operators to eyeball
//! whether a reshard left partitions roughly even.

use serde::Serialize;
use shardscale_core::{format_percentage, HashKeyRange, StreamStatus, StreamTopology};

/// One row of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardCoverage {
    pub shard_id: String,
    pub range: HashKeyRange,
    /// Fraction of the key space, `(end - start) / 2^128`
    pub coverage: f64,
}

impl ShardCoverage {
    /// Coverage as printed, e.g. `"25.00 %"`
    pub fn percentage(&self) -> String {
        format_percentage(self.coverage)
    }
}

/// Key-space distribution across the open shards of a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyReport {
    pub stream_name: String,
    pub status: StreamStatus,
    pub shards: Vec<ShardCoverage>,
    /// Sum of every row's coverage
    pub total_coverage: f64,
}

impl TopologyReport {
    /// Build a report from the open shards of `topology`, in topology order
    pub fn from_topology(topology: &StreamTopology) -> Self {
        let shards: Vec<ShardCoverage> = topology
            .open_shards(false)
            .into_iter()
            .map(|s| ShardCoverage {
                shard_id: s.shard_id.clone(),
                range: s.hash_key_range,
                coverage: s.hash_key_range.coverage(),
            })
            .collect();

        let total_coverage = shards.iter().map(|s| s.coverage).sum();

        Self {
            stream_name: topology.stream_name.clone(),
            status: topology.status,
            shards,
            total_coverage,
        }
    }

    pub fn open_shards(&self) -> usize {
        self.shards.len()
    }

    /// Two-column table of shard id and coverage
    pub fn to_table(&self) -> String {
        let rows: Vec<[String; 2]> = self
            .shards
            .iter()
            .map(|s| [s.shard_id.clone(), s.percentage()])
            .collect();
        render_table(["SHARD ID", "COVERAGE"], &rows)
    }
}

fn render_table(header: [&str; 2], rows: &[[String; 2]]) -> String {
    let mut widths = [header[0].len(), header[1].len()];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let border = format!(
        "+{}+{}+\n",
        "-".repeat(widths[0] + 2),
        "-".repeat(widths[1] + 2)
    );

    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&format!(
        "| {:<w0$} | {:<w1$} |\n",
        header[0],
        header[1],
        w0 = widths[0],
        w1 = widths[1]
    ));
    out.push_str(&border);
    for row in rows {
        out.push_str(&format!(
            "| {:<w0$} | {:>w1$} |\n",
            row[0],
            row[1],
            w0 = widths[0],
            w1 = widths[1]
        ));
    }
    out.push_str(&border);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardscale_core::{HashKey, SequenceNumberRange, Shard};

    const Q: u128 = 1u128 << 126;

    fn shard(id: &str, start: u128, end: u128, open: bool) -> Shard {
        Shard {
            shard_id: id.to_string(),
            parent_shard_id: None,
            adjacent_parent_shard_id: None,
            hash_key_range: HashKeyRange::new(HashKey::new(start), HashKey::new(end)).unwrap(),
            sequence_number_range: SequenceNumberRange {
                starting_sequence_number: "1".to_string(),
                ending_sequence_number: if open { None } else { Some("2".to_string()) },
            },
        }
    }

    #[test]
    fn test_quarter_shard_is_25_percent() {
        let topology = StreamTopology::new(
            "clicks",
            StreamStatus::Active,
            vec![shard("shardId-000000000000", 0, Q, true)],
        );
        let report = TopologyReport::from_topology(&topology);
        assert_eq!(report.shards[0].percentage(), "25.00 %");
    }

    #[test]
    fn test_report_skips_closed_shards() {
        let topology = StreamTopology::new(
            "clicks",
            StreamStatus::Active,
            vec![
                shard("parent", 0, u128::MAX, false),
                shard("low", 0, 2 * Q - 1, true),
                shard("high", 2 * Q, u128::MAX, true),
            ],
        );
        let report = TopologyReport::from_topology(&topology);

        assert_eq!(report.open_shards(), 2);
        assert_eq!(report.shards[0].percentage(), "50.00 %");
        assert_eq!(report.shards[1].percentage(), "50.00 %");
        assert!((report.total_coverage - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report() {
        let topology = StreamTopology::new("clicks", StreamStatus::Active, Vec::new());
        let report = TopologyReport::from_topology(&topology);
        assert_eq!(report.open_shards(), 0);
        assert_eq!(report.total_coverage, 0.0);
        assert_eq!(report.to_table().lines().count(), 4);
    }

    #[test]
    fn test_table_layout() {
        let topology = StreamTopology::new(
            "clicks",
            StreamStatus::Active,
            vec![shard("shardId-000000000000", 0, u128::MAX, true)],
        );
        let table = TopologyReport::from_topology(&topology).to_table();
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "+----------------------+----------+");
        assert_eq!(lines[1], "| SHARD ID             | COVERAGE |");
        assert_eq!(lines[3], "| shardId-000000000000 | 100.00 % |");
    }
}
