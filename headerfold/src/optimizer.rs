//! Dead-branch elimination over `#if 0` / `#if 1` regions.

use log::debug;

use crate::block::{Block, Directive};
use crate::expr::Expr;

/// Index of the `#else`, `#elif` or `#endif` closing the group opened before `start`
///
/// Scanning begins at `start` with a nesting depth of one. Returns
/// `blocks.len()` when the group is never closed.
#[must_use]
pub fn find_matching_endif(blocks: &[Block], start: usize) -> usize {
    let mut depth = 1usize;
    for (i, block) in blocks.iter().enumerate().skip(start) {
        match block.directive_kind() {
            Some(directive) if directive.opens_conditional() => depth += 1,
            Some(Directive::Else | Directive::Elif) if depth == 1 => return i,
            Some(Directive::Endif) => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    blocks.len()
}

/// Remove statically false regions and unwrap statically true ones
///
/// Conditions must already be macro-substituted; only those whose expression
/// is an integer constant are acted upon. A false `#if` turns a following
/// `#else` into `#if 1` and a following `#elif` into `#if`, a true `#if`
/// keeps its body and turns what follows into a false condition, and both
/// rewritten blocks are scanned again. Unterminated groups are kept verbatim.
#[must_use]
pub fn optimize_if01(blocks: &[Block]) -> Vec<Block> {
    let mut result = Vec::with_capacity(blocks.len());
    let mut i = 0;
    // Replacement for `blocks[i]` produced by the previous step
    let mut head: Option<Block> = None;

    while i < blocks.len() {
        let block = head.take().unwrap_or_else(|| blocks[i].clone());
        let Some(value) = block.expr().and_then(Expr::to_int) else {
            result.push(block);
            i += 1;
            continue;
        };

        let k = find_matching_endif(blocks, i + 1);
        let Some(terminator) = blocks.get(k) else {
            debug!("line {}: unterminated conditional kept as is", block.line());
            result.push(block);
            result.extend_from_slice(&blocks[i + 1..]);
            break;
        };

        if value == 0 {
            match terminator.directive_kind() {
                Some(Directive::Else) => {
                    debug!(
                        "lines {}-{}: false branch dropped, #else becomes #if 1",
                        block.line(),
                        terminator.line()
                    );
                    head = Some(terminator.with_constant(Directive::If, 1));
                    i = k;
                }
                Some(Directive::Elif) => {
                    debug!(
                        "lines {}-{}: false branch dropped, #elif becomes #if",
                        block.line(),
                        terminator.line()
                    );
                    head = Some(terminator.with_directive(Directive::If));
                    i = k;
                }
                _ => {
                    debug!(
                        "lines {}-{}: false region removed",
                        block.line(),
                        terminator.line()
                    );
                    i = k + 1;
                }
            }
        } else {
            result.extend(optimize_if01(&blocks[i + 1..k]));
            match terminator.directive_kind() {
                Some(Directive::Else) => {
                    debug!(
                        "lines {}-{}: true branch kept, #else becomes #if 0",
                        block.line(),
                        terminator.line()
                    );
                    head = Some(terminator.with_constant(Directive::If, 0));
                    i = k;
                }
                Some(Directive::Elif) => {
                    debug!(
                        "lines {}-{}: true branch kept, #elif becomes #elif 0",
                        block.line(),
                        terminator.line()
                    );
                    head = Some(terminator.with_constant(Directive::Elif, 0));
                    i = k;
                }
                _ => {
                    debug!(
                        "lines {}-{}: true region unwrapped",
                        block.line(),
                        terminator.line()
                    );
                    i = k + 1;
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn blocks(source: &str) -> Vec<Block> {
        parse_source(source).unwrap().iter().cloned().collect()
    }

    fn optimized(source: &str) -> Vec<String> {
        optimize_if01(&blocks(source))
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn keeps_true_drops_false() {
        assert_eq!(
            optimized("#if 1\n#define GOOD_1\n#endif\n#if 0\n#define BAD_2\n#endif\n"),
            ["#define GOOD_1"]
        );
    }

    #[test]
    fn false_if_with_else_keeps_else_body() {
        assert_eq!(
            optimized("#if 0\n#define BAD\n#else\n#define GOOD\n#endif\n"),
            ["#define GOOD"]
        );
    }

    #[test]
    fn true_if_with_else_drops_else_body() {
        assert_eq!(
            optimized("#if 1\n#define GOOD\n#else\n#define BAD\n#endif\n"),
            ["#define GOOD"]
        );
    }

    #[test]
    fn nested_dead_regions_vanish() {
        assert_eq!(
            optimized("#if 0\n#if 1\n#define BAD_6\n#endif\n#endif\n#define AFTER\n"),
            ["#define AFTER"]
        );
        assert_eq!(
            optimized("#if 1\n#if 0\n#if X\n#define BAD\n#endif\n#endif\n#define GOOD\n#endif\n"),
            ["#define GOOD"]
        );
    }

    #[test]
    fn false_if_promotes_elif() {
        assert_eq!(
            optimized("#if 0\n#define A\n#elif X\n#define B\n#else\n#define C\n#endif\n"),
            ["#if X", "#define B", "#else", "#define C", "#endif"]
        );
    }

    #[test]
    fn true_if_drops_elif_chain() {
        assert_eq!(
            optimized("#if 1\n#define A\n#elif X\n#define B\n#endif\n"),
            ["#define A"]
        );
    }

    #[test]
    fn dead_elif_resumes_from_rewritten_block() {
        // The `#elif 0` is rescanned on its own, so its `#else` becomes live
        assert_eq!(
            optimized("#if 1\n#define A\n#elif X\n#define B\n#else\n#define C\n#endif\n"),
            ["#define A", "#define C"]
        );
    }

    #[test]
    fn undecidable_conditions_are_kept() {
        assert_eq!(
            optimized("#if X\n#if 1\n#define A\n#endif\n#endif\n"),
            ["#if X", "#define A", "#endif"]
        );
    }

    #[test]
    fn unterminated_conditionals_are_kept() {
        assert_eq!(
            optimized("#if 0\n#define A\n#if 1\n#define B\n"),
            ["#if 0", "#define A", "#if 1", "#define B"]
        );
    }

    #[test]
    fn matching_endif_tracks_depth() {
        let list = blocks("#if A\n#ifdef B\n#else\n#endif\n#elif C\n#endif\n");
        assert_eq!(find_matching_endif(&list, 1), 4);
        assert_eq!(find_matching_endif(&list, 2), 2);
        assert_eq!(find_matching_endif(&list, 5), 5);
        assert_eq!(find_matching_endif(&list[..3], 1), 3);
    }

    #[test]
    fn input_is_not_modified() {
        let input = blocks("#if 0\n#else\n#define A\n#endif\n");
        let _ = optimize_if01(&input);
        assert_eq!(input[1].directive_kind(), Some(&Directive::Else));
    }
}
