//! The two land-cover rule tables
//!
//! Taxonomy A is the fine-scale land-resource map (AR5), taxonomy B the
//! coarse one (AR50). Row order is significant: later rows overwrite
//! earlier ones.

use super::{Condition, MaskKind, Rule, RuleTable, Unmatched};

/// Taxonomy-A (AR5) rules. Rule 7 reads taxonomy B at the same cell.
pub fn taxonomy_a() -> RuleTable {
    use Condition::*;
    use MaskKind::*;

    RuleTable {
        name: "taxonomy A".into(),
        rules: vec![
            Rule::new(Code(30), 101),
            Rule::new(Code(70), 201),
            Rule::new(Code(60), 401),
            Rule::new(Code(23), 501),
            Rule::new(Code(50), 601),
            Rule::new(Condition::code_and(50, Coastal), 501),
            Rule::new(All(vec![Code(50), OtherCode(60)]), 412),
            Rule::new(Condition::code_and(50, ForestLine), 201),
            Rule::new(Code(82), 701),
            Rule::new(Code(81), 801),
            Rule::new(Code(22), 811),
            Rule::new(Code(21), 831),
            Rule::new(Condition::code_in(&[11, 12]), 841),
            // last, so the arctic zone overrides every earlier code-50 refinement
            Rule::new(Condition::code_and(50, Arctic), 301),
        ],
        unmatched: Unmatched::Retain,
    }
}

/// Taxonomy-B (AR50) rules.
///
/// The arctic rule reads as "(50 or 70) and arctic": the disjunction is
/// grouped first, matching how the chained expression evaluates left to
/// right.
pub fn taxonomy_b() -> RuleTable {
    use Condition::*;
    use MaskKind::*;

    RuleTable {
        name: "taxonomy B".into(),
        rules: vec![
            Rule::new(Code(30), 102),
            Rule::new(Condition::code_in(&[50, 70]), 202),
            Rule::new(Code(60), 402),
            Rule::new(Code(81), 802),
            Rule::new(Code(82), 702),
            Rule::new(Code(10), 842),
            Rule::new(Code(20), 832),
            Rule::new(Condition::code_and(20, ForestLine), 822),
            Rule::new(All(vec![Condition::code_in(&[50, 70]), Mask(Arctic)]), 302),
        ],
        unmatched: Unmatched::Retain,
    }
}

#[cfg(test)]
mod tests {
    use super::super::Cell;
    use super::*;
    use crate::config::DENSE_CODES;

    fn cell(code: i32, other: Option<i32>, coastal: bool, forest_line: bool, arctic: bool) -> Cell {
        Cell { code, other, coastal, forest_line, arctic }
    }

    /// Every combination of the four code-50 conditions
    fn combinations(code: i32) -> Vec<Cell> {
        let mut out = Vec::new();
        for bits in 0..16u8 {
            out.push(cell(
                code,
                if bits & 1 != 0 { Some(60) } else { Some(30) },
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
            ));
        }
        out
    }

    #[test]
    fn test_table_sizes() {
        assert_eq!(taxonomy_a().rules.len(), 14);
        assert_eq!(taxonomy_b().rules.len(), 9);
    }

    #[test]
    fn test_forest_ignores_masks() {
        let a = taxonomy_a();
        for c in combinations(30) {
            assert_eq!(a.apply(&c), 101);
        }
    }

    #[test]
    fn test_code_50_precedence() {
        let a = taxonomy_a();
        for c in combinations(50) {
            let expected = if c.arctic {
                301
            } else if c.forest_line {
                201
            } else if c.other == Some(60) {
                412
            } else if c.coastal {
                501
            } else {
                601
            };
            assert_eq!(a.apply(&c), expected, "{:?}", c);
        }
    }

    #[test]
    fn test_taxonomy_a_simple_codes() {
        let a = taxonomy_a();
        for (code, expected) in [
            (70, 201), (60, 401), (23, 501), (82, 701), (81, 801),
            (22, 811), (21, 831), (11, 841), (12, 841),
        ] {
            assert_eq!(a.apply(&Cell::new(code)), expected, "code {}", code);
        }
        // arctic does not refine non-50 codes in taxonomy A
        assert_eq!(a.apply(&cell(70, None, false, false, true)), 201);
    }

    #[test]
    fn test_unmapped_code_is_retained() {
        assert_eq!(taxonomy_a().apply(&Cell::new(99)), 99);
        assert_eq!(taxonomy_a().apply(&Cell::new(40)), 40);
        assert_eq!(taxonomy_b().apply(&Cell::new(99)), 99);
    }

    #[test]
    fn test_taxonomy_b_rules() {
        let b = taxonomy_b();
        for (code, expected) in [
            (30, 102), (50, 202), (70, 202), (60, 402), (81, 802),
            (82, 702), (10, 842), (20, 832),
        ] {
            assert_eq!(b.apply(&Cell::new(code)), expected, "code {}", code);
        }
        assert_eq!(b.apply(&cell(20, None, false, true, false)), 822);
        assert_eq!(b.apply(&cell(30, None, false, true, true)), 102);
    }

    #[test]
    fn test_taxonomy_b_arctic_refines_50_and_70() {
        let b = taxonomy_b();
        assert_eq!(b.apply(&cell(50, None, false, false, true)), 302);
        assert_eq!(b.apply(&cell(70, None, false, false, true)), 302);
        assert_eq!(b.apply(&cell(60, None, false, false, true)), 402);
    }

    #[test]
    fn test_output_codes_fold_to_dense_index() {
        for table in [taxonomy_a(), taxonomy_b()] {
            for code in table.output_codes() {
                assert!(
                    DENSE_CODES.iter().any(|(c, _)| *c == code),
                    "{} emits {} which has no statistics category",
                    table.name,
                    code
                );
            }
        }
    }

    #[test]
    fn test_layer_requirements() {
        let a = taxonomy_a();
        assert!(a.uses_other());
        assert_eq!(a.masks().len(), 3);

        let b = taxonomy_b();
        assert!(!b.uses_other());
        assert_eq!(
            b.masks().into_iter().collect::<Vec<_>>(),
            vec![MaskKind::ForestLine, MaskKind::Arctic]
        );
    }
}
