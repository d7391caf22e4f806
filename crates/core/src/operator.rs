//! The closed set of supported NCO operators.
//!
//! Also holds the flags that turn an operator into a "printing" call, where
//! stdout is the payload and no output file is produced.

use std::fmt;
use std::str::FromStr;

use crate::error::NcoError;

/// One of the supported NCO command-line operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Ncap2,
    Ncatted,
    Ncbo,
    Nces,
    Ncecat,
    Ncflint,
    Ncks,
    Ncpdq,
    Ncra,
    Ncrcat,
    Ncrename,
    Ncwa,
    Ncea,
    Ncdump,
}

/// Command tokens that mark a call as printing to stdout.
///
/// Matching is exact: abbreviated or combined spellings (`-Hm`, `--metad`)
/// are not recognised. Callers can force print mode explicitly with
/// [`CallOptions::operator_prints_out`](crate::options::CallOptions).
pub const PRINT_FLAGS: &[&str] = &[
    "ncdump",
    "-H",
    "--data",
    "--hieronymus",
    "-M",
    "--Mtd",
    "--Metadata",
    "-m",
    "--mtd",
    "--metadata",
    "-P",
    "--prn",
    "--print",
    "-r",
    "--revision",
    "--vrs",
    "--version",
    "--u",
    "--units",
];

impl Operator {
    pub const ALL: [Operator; 14] = [
        Self::Ncap2,
        Self::Ncatted,
        Self::Ncbo,
        Self::Nces,
        Self::Ncecat,
        Self::Ncflint,
        Self::Ncks,
        Self::Ncpdq,
        Self::Ncra,
        Self::Ncrcat,
        Self::Ncrename,
        Self::Ncwa,
        Self::Ncea,
        Self::Ncdump,
    ];

    /// Executable name of the operator.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ncap2 => "ncap2",
            Self::Ncatted => "ncatted",
            Self::Ncbo => "ncbo",
            Self::Nces => "nces",
            Self::Ncecat => "ncecat",
            Self::Ncflint => "ncflint",
            Self::Ncks => "ncks",
            Self::Ncpdq => "ncpdq",
            Self::Ncra => "ncra",
            Self::Ncrcat => "ncrcat",
            Self::Ncrename => "ncrename",
            Self::Ncwa => "ncwa",
            Self::Ncea => "ncea",
            Self::Ncdump => "ncdump",
        }
    }

    /// `ncdump` always writes to stdout, whatever its flags.
    pub fn always_prints(self) -> bool {
        matches!(self, Self::Ncdump)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = NcoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| NcoError::UnknownOperator(s.to_string()))
    }
}

/// Whether a single command token is one of [`PRINT_FLAGS`].
pub fn is_print_flag(token: &str) -> bool {
    PRINT_FLAGS.contains(&token)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn every_operator_round_trips_through_its_name() {
        for op in Operator::ALL {
            assert_eq!(op.name().parse::<Operator>().expect("known operator"), op);
            assert_eq!(op.to_string(), op.name());
        }
    }

    #[test]
    fn operator_names_are_unique() {
        let mut names: Vec<_> = Operator::ALL.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Operator::ALL.len());
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_matches!(
            "ncfoo".parse::<Operator>(),
            Err(NcoError::UnknownOperator(name)) if name == "ncfoo"
        );
        // Lookup is case sensitive, like the executables.
        assert!("NCKS".parse::<Operator>().is_err());
    }

    #[test]
    fn only_ncdump_always_prints() {
        let printing: Vec<_> = Operator::ALL
            .into_iter()
            .filter(|op| op.always_prints())
            .collect();
        assert_eq!(printing, vec![Operator::Ncdump]);
    }

    #[test]
    fn print_flags_match_exactly() {
        assert!(is_print_flag("-M"));
        assert!(is_print_flag("--units"));
        assert!(!is_print_flag("-Hm"));
        assert!(!is_print_flag("--metad"));
        assert!(!is_print_flag("-O"));
    }
}
