use std::sync::Arc;

use crate::error::{Error, Result};
use crate::input::Input;

#[derive(Debug, Clone)]
enum Targets {
    None,
    Labels(Arc<[Option<usize>]>),
    Values(Arc<[Vec<f32>]>),
}

/// An adapter over rows already in memory.
///
/// Rows and targets sit behind `Arc`, so worker clones share the data and
/// only the cursor is copied.
#[derive(Debug, Clone)]
pub struct MemoryInput {
    rows: Arc<[Vec<f32>]>,
    targets: Targets,
    units: usize,
    pos: u64,
    dropout_rate: f64,
}

impl MemoryInput {
    /// Rows with a class index each; `None` marks a missing label.
    pub fn classification(rows: Vec<Vec<f32>>, labels: Vec<Option<usize>>) -> Result<MemoryInput> {
        check_len("labels", rows.len(), labels.len())?;
        let mut input = MemoryInput::unlabeled(rows)?;
        input.targets = Targets::Labels(labels.into());
        Ok(input)
    }

    /// Rows with a vector of regression targets each, all of the same width.
    pub fn regression(rows: Vec<Vec<f32>>, values: Vec<Vec<f32>>) -> Result<MemoryInput> {
        check_len("target rows", rows.len(), values.len())?;
        if let Some(first) = values.first() {
            if let Some(bad) = values.iter().find(|v| v.len() != first.len()) {
                return Err(Error::InvalidConfig(format!(
                    "target rows have {} and {} values",
                    first.len(),
                    bad.len()
                )));
            }
        }
        let mut input = MemoryInput::unlabeled(rows)?;
        input.targets = Targets::Values(values.into());
        Ok(input)
    }

    /// Rows without targets, e.g. for autoencoders.
    pub fn unlabeled(rows: Vec<Vec<f32>>) -> Result<MemoryInput> {
        let units = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || units == 0 {
            return Err(Error::InvalidConfig("input needs at least one non-empty row".into()));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != units) {
            return Err(Error::InvalidConfig(format!(
                "rows have {} and {} features",
                units,
                bad.len()
            )));
        }
        Ok(MemoryInput {
            rows: rows.into(),
            targets: Targets::None,
            units,
            pos: 0,
            dropout_rate: 0.0,
        })
    }

    pub fn with_dropout(mut self, rate: f64) -> MemoryInput {
        self.dropout_rate = rate;
        self
    }

    /// Number of classes implied by the largest label.
    pub fn classes(&self) -> Option<usize> {
        match &self.targets {
            Targets::Labels(labels) => labels.iter().flatten().max().map(|m| m + 1),
            _ => None,
        }
    }
}

impl Input for MemoryInput {
    fn units(&self) -> usize {
        self.units
    }

    fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) {
        self.pos = pos % self.len();
    }

    fn features(&self, out: &mut [f32]) {
        out.copy_from_slice(&self.rows[self.pos as usize]);
    }

    fn label(&self) -> Option<usize> {
        match &self.targets {
            Targets::Labels(labels) => labels[self.pos as usize],
            _ => None,
        }
    }

    fn values(&self, out: &mut [f32]) {
        match &self.targets {
            Targets::Values(values) => {
                let row = &values[self.pos as usize];
                for (o, v) in out.iter_mut().enumerate() {
                    *v = row.get(o).copied().unwrap_or(f32::NAN);
                }
            }
            _ => out.fill(f32::NAN),
        }
    }

    fn dropout_rate(&self) -> f64 {
        self.dropout_rate
    }

    fn box_clone(&self) -> Box<dyn Input> {
        Box::new(self.clone())
    }
}

fn check_len(what: &str, rows: usize, targets: usize) -> Result<()> {
    if rows != targets {
        return Err(Error::InvalidConfig(format!("{rows} rows but {targets} {what}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_targets_follow_cursor() {
        let mut input = MemoryInput::classification(
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            vec![Some(1), None, Some(2)],
        )
        .unwrap();
        assert_eq!(input.classes(), Some(3));
        assert_eq!(input.label(), Some(1));
        input.advance();
        assert_eq!(input.label(), None);
        input.advance();
        let mut out = vec![0.0; 2];
        input.features(&mut out);
        assert_eq!(out, vec![1.0, 1.0]);
    }

    #[test]
    fn regression_targets_fill_missing_with_nan() {
        let input = MemoryInput::regression(vec![vec![0.0]], vec![vec![2.0]]).unwrap();
        let mut out = vec![0.0; 2];
        input.values(&mut out);
        assert_eq!(out[0], 2.0);
        assert!(out[1].is_nan());
    }

    #[test]
    fn rejects_ragged_or_mismatched_data() {
        assert!(MemoryInput::unlabeled(vec![]).is_err());
        assert!(MemoryInput::unlabeled(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(MemoryInput::classification(vec![vec![1.0]], vec![]).is_err());
        let targets = vec![vec![1.0], vec![]];
        assert!(MemoryInput::regression(vec![vec![1.0], vec![2.0]], targets).is_err());
    }

    #[test]
    fn seek_wraps_and_dropout_is_carried() {
        let mut input = MemoryInput::unlabeled(vec![vec![1.0], vec![2.0]])
            .unwrap()
            .with_dropout(0.2);
        input.seek(5);
        assert_eq!(input.position(), 1);
        assert_eq!(input.dropout_rate(), 0.2);
        let clone = input.box_clone();
        assert_eq!(clone.position(), 1);
    }
}
