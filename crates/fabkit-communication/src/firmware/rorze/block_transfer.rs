//! Block transfer
//!
//! A block is a named group of registers read with a get verb and written
//! back with the matching set verb. Reads produce the exact lines a restore
//! would send: `DEQU.STDT=...`, `DRCS.STDT[3]=...` or, for root blocks,
//! `STDT[1]=...`.

use crate::communication::session::DeviceSession;
use crate::firmware::rorze::frame::{ack_prefix, encode_command};
use fabkit_core::Result;
use tracing::{debug, error};

/// Derive the get verb from a set verb, `STDT` becomes `GTDT`
pub fn get_verb(set_verb: &str) -> String {
    match set_verb.strip_prefix('S') {
        Some(rest) => format!("G{}", rest),
        None => set_verb.to_string(),
    }
}

/// Which elements of a block are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockIndices {
    /// `0..n`; a count of one reads the block without an index
    Count(usize),
    /// Explicit indices, always sent with the index
    List(Vec<usize>),
}

/// One block of a backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    /// Block name, `None` for registers on the unit itself
    pub name: Option<String>,
    pub indices: BlockIndices,
    /// Set verb, possibly with a fixed index (`STDT[2]`)
    pub set_verb: String,
    /// Write `[0]` on single-element lines
    pub bracket_single: bool,
    /// Minimum width of indices in written lines
    pub zero_pad: Option<usize>,
}

impl BlockSpec {
    /// Block read `0..count`
    pub fn new(name: &str, count: usize, set_verb: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            indices: BlockIndices::Count(count),
            set_verb: set_verb.to_string(),
            bracket_single: false,
            zero_pad: None,
        }
    }

    /// Block read at explicit indices
    pub fn list(name: &str, indices: &[usize], set_verb: &str) -> Self {
        Self {
            indices: BlockIndices::List(indices.to_vec()),
            ..Self::new(name, 0, set_verb)
        }
    }

    /// Registers on the unit itself, at explicit indices
    pub fn root(indices: &[usize], set_verb: &str) -> Self {
        Self {
            name: None,
            ..Self::list("", indices, set_verb)
        }
    }

    pub fn with_bracket_single(mut self) -> Self {
        self.bracket_single = true;
        self
    }

    pub fn with_zero_pad(mut self, width: usize) -> Self {
        self.zero_pad = Some(width);
        self
    }

    /// Get verb matching the set verb
    pub fn get_verb(&self) -> String {
        get_verb(&self.set_verb)
    }

    /// Indices to read, `None` meaning the block is read as a whole
    pub fn read_indices(&self) -> Vec<Option<usize>> {
        match &self.indices {
            BlockIndices::Count(1) => vec![None],
            BlockIndices::Count(n) => (0..*n).map(Some).collect(),
            BlockIndices::List(list) => list.iter().copied().map(Some).collect(),
        }
    }

    /// Number of reads this block takes
    pub fn read_count(&self) -> usize {
        match &self.indices {
            BlockIndices::Count(n) => *n,
            BlockIndices::List(list) => list.len(),
        }
    }

    fn qualified(&self, verb: &str) -> String {
        match &self.name {
            Some(name) => format!("{}.{}", name, verb),
            None => verb.to_string(),
        }
    }

    /// Command reading one element
    pub fn command(&self, short_name: &str, index: Option<usize>) -> String {
        let verb = match index {
            Some(i) => format!("{}[{}]", self.get_verb(), i),
            None => self.get_verb(),
        };
        encode_command(short_name, &self.qualified(&verb))
    }

    /// Prefix every reply of this block must start with
    ///
    /// A fixed table index in the verb is echoed, the element index is not.
    pub fn expected_prefix(&self, short_name: &str) -> String {
        ack_prefix(short_name, &self.qualified(&self.get_verb()))
    }

    /// Restore line for one element
    pub fn line(&self, index: Option<usize>, value: &str) -> String {
        let index = match (index, self.bracket_single) {
            (Some(i), _) => Some(i),
            (None, true) => Some(0),
            (None, false) => None,
        };
        let verb = match index {
            Some(i) => match self.zero_pad {
                Some(width) => format!("{}[{:0width$}]", self.set_verb, i, width = width),
                None => format!("{}[{}]", self.set_verb, i),
            },
            None => self.set_verb.clone(),
        };
        format!("{}={}", self.qualified(&verb), value)
    }
}

/// Read one block and return its restore lines
///
/// Stops at the first reply whose prefix does not echo the request.
pub fn read_block(session: &DeviceSession, spec: &BlockSpec) -> Result<Vec<String>> {
    let short = session.short_name();
    let prefix = spec.expected_prefix(&short);
    let mut lines = Vec::with_capacity(spec.read_count());

    for index in spec.read_indices() {
        let command = spec.command(&short, index);
        let reply = session.send_and_read(&command)?;
        let value = reply.strip_prefix(&prefix).map_err(|err| {
            error!("{}", err);
            err
        })?;
        lines.push(spec.line(index, value));
    }

    debug!(
        "Read block {} ({} lines)",
        spec.name.as_deref().unwrap_or("<root>"),
        lines.len()
    );
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_verb() {
        assert_eq!(get_verb("STDT"), "GTDT");
        assert_eq!(get_verb("SPRM"), "GPRM");
        assert_eq!(get_verb("SEPM"), "GEPM");
        assert_eq!(get_verb("STDA"), "GTDA");
        assert_eq!(get_verb("STDT[3]"), "GTDT[3]");
    }

    #[test]
    fn test_single_block() {
        let spec = BlockSpec::new("DEQU", 1, "STDT");
        assert_eq!(spec.read_indices(), vec![None]);
        assert_eq!(spec.command("oTRB0", None), "oTRB0.DEQU.GTDT");
        assert_eq!(spec.expected_prefix("oTRB0"), "aoTRB0.DEQU.GTDT:");
        assert_eq!(spec.line(None, "1,2,3"), "DEQU.STDT=1,2,3");
    }

    #[test]
    fn test_bracket_single() {
        let spec = BlockSpec::new("DRCI", 1, "STDT").with_bracket_single();
        assert_eq!(spec.command("oTBL0", None), "oTBL0.DRCI.GTDT");
        assert_eq!(spec.line(None, "5"), "DRCI.STDT[0]=5");
    }

    #[test]
    fn test_indexed_block() {
        let spec = BlockSpec::new("DRCS", 5, "STDT");
        assert_eq!(spec.read_count(), 5);
        assert_eq!(spec.command("oTRB0", Some(4)), "oTRB0.DRCS.GTDT[4]");
        assert_eq!(spec.line(Some(4), "x"), "DRCS.STDT[4]=x");
    }

    #[test]
    fn test_fixed_index_verb() {
        let spec = BlockSpec::new("DSDB", 4, "STDT[2]");
        assert_eq!(spec.command("oALN0", Some(3)), "oALN0.DSDB.GTDT[2][3]");
        assert_eq!(spec.expected_prefix("oALN0"), "aoALN0.DSDB.GTDT[2]:");
        assert_eq!(spec.line(Some(3), "7"), "DSDB.STDT[2][3]=7");
    }

    #[test]
    fn test_root_block() {
        let spec = BlockSpec::root(&[1], "STDT");
        assert_eq!(spec.read_indices(), vec![Some(1)]);
        assert_eq!(spec.command("oSTG1", Some(1)), "oSTG1.GTDT[1]");
        assert_eq!(spec.expected_prefix("oSTG1"), "aoSTG1.GTDT:");
        assert_eq!(spec.line(Some(1), "192.168.30.110"), "STDT[1]=192.168.30.110");
    }

    #[test]
    fn test_zero_pad() {
        let spec = BlockSpec::new("DTBL", 400, "STDA").with_zero_pad(3);
        assert_eq!(spec.line(Some(7), "v"), "DTBL.STDA[007]=v");
        assert_eq!(spec.command("oTBL0", Some(7)), "oTBL0.DTBL.GTDA[7]");
    }
}
