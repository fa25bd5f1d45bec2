//! Ordered override rule tables
//!
//! A [`RuleTable`] maps one land-cover taxonomy onto ecosystem-type codes.
//! Rules are evaluated in table order and every rule whose condition holds
//! overwrites the cell: the last matching rule wins. This lets a narrow,
//! later rule ("code 50 inside the arctic zone") refine a broad, earlier one
//! ("code 50") cell by cell.
//!
//! Conditions test the cell's own source code, the other taxonomy's code at
//! the same cell, and the auxiliary masks. A no-data code or mask cell never
//! satisfies a test.

mod tables;

pub use tables::{taxonomy_a, taxonomy_b};

use crate::maybe_rayon::*;
use ecotypes_core::raster::Raster;
use ecotypes_core::{Error, Grid, Result};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// Auxiliary boolean layers a condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MaskKind {
    Coastal,
    ForestLine,
    Arctic,
}

impl MaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            MaskKind::Coastal => "coastal",
            MaskKind::ForestLine => "forest_line",
            MaskKind::Arctic => "arctic",
        }
    }
}

/// Predicate over one cell
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Source code equals the value
    Code(i32),
    /// The other taxonomy's code equals the value
    OtherCode(i32),
    /// The mask is set
    Mask(MaskKind),
    /// At least one condition holds
    Any(Vec<Condition>),
    /// Every condition holds
    All(Vec<Condition>),
}

impl Condition {
    /// Source code is one of `codes`
    pub fn code_in(codes: &[i32]) -> Self {
        Condition::Any(codes.iter().map(|&c| Condition::Code(c)).collect())
    }

    /// Source code equals `code` and the mask is set
    pub fn code_and(code: i32, mask: MaskKind) -> Self {
        Condition::All(vec![Condition::Code(code), Condition::Mask(mask)])
    }

    pub fn eval(&self, cell: &Cell) -> bool {
        match self {
            Condition::Code(c) => cell.code == *c,
            Condition::OtherCode(c) => cell.other == Some(*c),
            Condition::Mask(kind) => cell.mask(*kind),
            Condition::Any(conds) => conds.iter().any(|c| c.eval(cell)),
            Condition::All(conds) => conds.iter().all(|c| c.eval(cell)),
        }
    }

    /// Whether the condition reads the other taxonomy
    pub fn uses_other(&self) -> bool {
        match self {
            Condition::OtherCode(_) => true,
            Condition::Any(conds) | Condition::All(conds) => conds.iter().any(Condition::uses_other),
            _ => false,
        }
    }

    /// Masks the condition reads
    pub fn masks(&self, out: &mut BTreeSet<MaskKind>) {
        match self {
            Condition::Mask(kind) => {
                out.insert(*kind);
            }
            Condition::Any(conds) | Condition::All(conds) => {
                conds.iter().for_each(|c| c.masks(out));
            }
            _ => {}
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Code(c) => write!(f, "code == {}", c),
            Condition::OtherCode(c) => write!(f, "other == {}", c),
            Condition::Mask(kind) => write!(f, "{}", kind.name()),
            Condition::Any(conds) => write_joined(f, conds, "OR"),
            Condition::All(conds) => write_joined(f, conds, "AND"),
        }
    }
}

/// Parenthesized so the grouping of compound conditions is explicit
fn write_joined(f: &mut fmt::Formatter<'_>, conds: &[Condition], op: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in conds.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, ")")
}

/// One table entry: where `when` holds, the cell becomes `then`
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub when: Condition,
    pub then: i32,
}

impl Rule {
    pub fn new(when: Condition, then: i32) -> Self {
        Self { when, then }
    }
}

/// What a cell matching no rule becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmatched {
    /// Keep the raw source code, so unexpected codes stay visible downstream
    Retain,
    /// Replace with a fixed code
    Set(i32),
}

/// Ordered rule list for one taxonomy
#[derive(Debug, Clone)]
pub struct RuleTable {
    pub name: String,
    pub rules: Vec<Rule>,
    pub unmatched: Unmatched,
}

impl RuleTable {
    /// Ecosystem-type code for one cell, last match wins
    pub fn apply(&self, cell: &Cell) -> i32 {
        self.rules
            .iter()
            .fold(None, |acc, rule| if rule.when.eval(cell) { Some(rule.then) } else { acc })
            .unwrap_or(match self.unmatched {
                Unmatched::Retain => cell.code,
                Unmatched::Set(code) => code,
            })
    }

    /// Every code a rule can emit
    pub fn output_codes(&self) -> BTreeSet<i32> {
        self.rules.iter().map(|r| r.then).collect()
    }

    /// Whether any rule reads the other taxonomy
    pub fn uses_other(&self) -> bool {
        self.rules.iter().any(|r| r.when.uses_other())
    }

    /// Masks any rule reads
    pub fn masks(&self) -> BTreeSet<MaskKind> {
        let mut out = BTreeSet::new();
        self.rules.iter().for_each(|r| r.when.masks(&mut out));
        out
    }
}

impl fmt::Display for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} rules, last match wins)", self.name, self.rules.len())?;
        for (i, rule) in self.rules.iter().enumerate() {
            writeln!(f, "  {:>2}. {} -> {}", i + 1, rule.when, rule.then)?;
        }
        match self.unmatched {
            Unmatched::Retain => write!(f, "  otherwise: keep source code"),
            Unmatched::Set(code) => write!(f, "  otherwise: {}", code),
        }
    }
}

/// Inputs of one cell as seen by the conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    pub code: i32,
    pub other: Option<i32>,
    pub coastal: bool,
    pub forest_line: bool,
    pub arctic: bool,
}

impl Cell {
    pub fn new(code: i32) -> Self {
        Self { code, ..Default::default() }
    }

    pub fn mask(&self, kind: MaskKind) -> bool {
        match kind {
            MaskKind::Coastal => self.coastal,
            MaskKind::ForestLine => self.forest_line,
            MaskKind::Arctic => self.arctic,
        }
    }
}

/// Layers a rule table may read besides its own source raster.
///
/// All must lie on the source raster's grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleLayers<'a> {
    /// The other taxonomy's composite
    pub other: Option<&'a Raster<i32>>,
    pub coastal: Option<&'a Raster<u8>>,
    pub forest_line: Option<&'a Raster<u8>>,
    pub arctic: Option<&'a Raster<u8>>,
}

impl<'a> RuleLayers<'a> {
    fn mask(&self, kind: MaskKind) -> Option<&'a Raster<u8>> {
        match kind {
            MaskKind::Coastal => self.coastal,
            MaskKind::ForestLine => self.forest_line,
            MaskKind::Arctic => self.arctic,
        }
    }

    /// Fail unless every layer the table reads is present and on `grid`
    fn check(&self, table: &RuleTable, grid: &Grid) -> Result<()> {
        if table.uses_other() {
            let other = self.other.ok_or_else(|| Error::MissingLayer {
                table: table.name.clone(),
                layer: "other taxonomy",
            })?;
            other.ensure_on(grid, "other taxonomy")?;
        }
        for kind in table.masks() {
            let mask = self.mask(kind).ok_or_else(|| Error::MissingLayer {
                table: table.name.clone(),
                layer: kind.name(),
            })?;
            mask.ensure_on(grid, kind.name())?;
        }
        Ok(())
    }
}

fn mask_set(mask: Option<&Raster<u8>>, row: usize, col: usize) -> bool {
    mask.and_then(|m| m.valid(row, col)) == Some(1)
}

/// Apply `table` to every cell of `source`.
///
/// No-data source cells stay no-data; every other cell gets the table's
/// code (or the unmatched policy's). Layers the table reads must be
/// supplied and lie on the source grid.
pub fn reclassify(source: &Raster<i32>, table: &RuleTable, layers: &RuleLayers) -> Result<Raster<i32>> {
    let grid = source.grid();
    layers.check(table, &grid)?;

    let (rows, cols) = source.shape();
    let nodata = source.nodata().unwrap_or(i32::MIN);
    let outputs = table.output_codes();

    info!("Reclassifying {} ({}x{}, {} rules)", table.name, rows, cols, table.rules.len());

    let data: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let Some(code) = source.valid(row, col) else {
                        return nodata;
                    };
                    let cell = Cell {
                        code,
                        other: layers.other.and_then(|o| o.valid(row, col)),
                        coastal: mask_set(layers.coastal, row, col),
                        forest_line: mask_set(layers.forest_line, row, col),
                        arctic: mask_set(layers.arctic, row, col),
                    };
                    table.apply(&cell)
                })
                .collect::<Vec<i32>>()
        })
        .collect();

    let unmatched = data
        .iter()
        .filter(|&&v| v != nodata && !outputs.contains(&v))
        .count();
    if unmatched > 0 {
        debug!("{}: {} cells matched no rule", table.name, unmatched);
    }

    source.derive(data, Some(nodata))
}
