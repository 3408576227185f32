use std::collections::HashMap;

use tracing::debug;

use super::ir::{Block, BinaryScript, CoreOpcode, Instruction, Operand};

// ── Pass contracts ───────────────────────────────────────────────

/// A pass that only needs to see one block at a time.
pub trait BlockPass {
    fn name(&self) -> &'static str;

    /// Rewrite `block` in place, returning the number of changes made.
    fn run(&self, block: &mut Block) -> usize;
}

/// A pass that needs cross-block information (jump targets, block order).
pub trait ScriptPass {
    fn name(&self) -> &'static str;

    fn run(&self, script: &mut BinaryScript) -> usize;
}

pub enum Pass {
    Block(Box<dyn BlockPass>),
    Script(Box<dyn ScriptPass>),
}

impl Pass {
    fn name(&self) -> &'static str {
        match self {
            Pass::Block(pass) => pass.name(),
            Pass::Script(pass) => pass.name(),
        }
    }

    fn run(&self, script: &mut BinaryScript) -> usize {
        match self {
            Pass::Block(pass) => script.blocks.blocks.iter_mut().map(|block| pass.run(block)).sum(),
            Pass::Script(pass) => pass.run(script),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub iterations: usize,
    pub changes: usize,
}

/// Runs its passes in order, repeatedly, until an iteration changes nothing
/// or the iteration ceiling is hit.
pub struct Optimizer {
    passes: Vec<Pass>,
    max_iterations: usize,
}

impl Optimizer {
    pub fn new(max_iterations: usize) -> Self {
        Self::with_passes(
            vec![
                Pass::Block(Box::new(ConstantFolding)),
                Pass::Block(Box::new(DeadBranch)),
                Pass::Script(Box::new(NaturalFlow)),
                Pass::Script(Box::new(DeadBlock)),
            ],
            max_iterations,
        )
    }

    pub fn with_passes(passes: Vec<Pass>, max_iterations: usize) -> Self {
        Self { passes, max_iterations }
    }

    pub fn run(&self, script: &mut BinaryScript) -> OptimizeStats {
        let mut stats = OptimizeStats::default();
        while stats.iterations < self.max_iterations {
            stats.iterations += 1;
            let mut changed = 0;
            for pass in &self.passes {
                let count = pass.run(script);
                if count > 0 {
                    debug!(script = %script.name, pass = pass.name(), count, "optimizer pass");
                }
                changed += count;
            }
            stats.changes += changed;
            if changed == 0 {
                break;
            }
        }
        debug!(
            script = %script.name,
            iterations = stats.iterations,
            changes = stats.changes,
            "optimized"
        );
        stats
    }
}

// ── Constant folding ─────────────────────────────────────────────

/// `PUSH_INT_CONSTANT a, PUSH_INT_CONSTANT b, <op>` becomes one push of the
/// result. Folded results are rechecked against the preceding push, so a
/// single run folds a whole constant expression.
pub struct ConstantFolding;

fn fold(op: CoreOpcode, a: i32, b: i32) -> Option<i32> {
    match op {
        CoreOpcode::Add => Some(a.wrapping_add(b)),
        CoreOpcode::Sub => Some(a.wrapping_sub(b)),
        CoreOpcode::Mul => Some(a.wrapping_mul(b)),
        // a zero divisor is left for the runtime to fault on
        CoreOpcode::Div if b != 0 => Some(a.wrapping_div(b)),
        CoreOpcode::Mod if b != 0 => Some(a.wrapping_rem(b)),
        _ => None,
    }
}

impl BlockPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&self, block: &mut Block) -> usize {
        let mut changes = 0;
        let mut out: Vec<Instruction> = Vec::with_capacity(block.instructions.len());
        for instruction in block.instructions.drain(..) {
            let folded = match (instruction.opcode.core(), out.as_slice()) {
                (Some(op), [.., a, b]) if op.is_arithmetic() => a
                    .int_constant()
                    .zip(b.int_constant())
                    .and_then(|(a, b)| fold(op, a, b)),
                _ => None,
            };
            match folded {
                Some(value) => {
                    out.truncate(out.len() - 2);
                    out.push(Instruction::new(CoreOpcode::PushIntConstant, Operand::Int(value)));
                    changes += 1;
                }
                None => out.push(instruction),
            }
        }
        block.instructions = out;
        changes
    }
}

// ── Dead branches ────────────────────────────────────────────────

/// Drops instructions that follow a `RETURN` or unconditional `BRANCH`
/// within the same block.
pub struct DeadBranch;

impl BlockPass for DeadBranch {
    fn name(&self) -> &'static str {
        "dead-branch"
    }

    fn run(&self, block: &mut Block) -> usize {
        let end = block
            .instructions
            .iter()
            .position(|i| i.is(CoreOpcode::Return) || i.is(CoreOpcode::Branch));
        match end {
            Some(index) if index + 1 < block.instructions.len() => {
                let removed = block.instructions.len() - index - 1;
                block.instructions.truncate(index + 1);
                removed
            }
            _ => 0,
        }
    }
}

// ── Natural flow ─────────────────────────────────────────────────

/// Removes a trailing `BRANCH` whose target is the very next block.
pub struct NaturalFlow;

impl ScriptPass for NaturalFlow {
    fn name(&self) -> &'static str {
        "natural-flow"
    }

    fn run(&self, script: &mut BinaryScript) -> usize {
        let next_labels: Vec<Option<u32>> = script
            .blocks
            .blocks
            .iter()
            .skip(1)
            .map(|b| Some(b.label.id))
            .chain(std::iter::once(None))
            .collect();
        let mut changes = 0;
        for (block, next) in script.blocks.blocks.iter_mut().zip(next_labels) {
            let falls_through = block
                .last()
                .filter(|i| i.is(CoreOpcode::Branch))
                .and_then(Instruction::label)
                .is_some_and(|target| Some(target.id) == next);
            if falls_through {
                block.instructions.pop();
                changes += 1;
            }
        }
        changes
    }
}

// ── Dead blocks ──────────────────────────────────────────────────

/// Removes every non-entry block nothing can reach: no branch or switch case
/// targets it and the block before it does not fall through into it.
pub struct DeadBlock;

impl ScriptPass for DeadBlock {
    fn name(&self) -> &'static str {
        "dead-block"
    }

    fn run(&self, script: &mut BinaryScript) -> usize {
        let mut incoming: HashMap<u32, usize> = HashMap::new();
        for label in script.instructions().filter_map(Instruction::label) {
            *incoming.entry(label.id).or_default() += 1;
        }
        for case in script.switch_tables.iter().flat_map(|t| &t.cases) {
            *incoming.entry(case.label.id).or_default() += 1;
        }

        let blocks = &script.blocks.blocks;
        let dead: Vec<bool> = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| {
                let falls_into = index
                    .checked_sub(1)
                    .and_then(|prev| blocks.get(prev))
                    .is_some_and(|prev| !prev.ends_flow());
                index > 0 && !falls_into && !incoming.contains_key(&block.label.id)
            })
            .collect();

        let before = script.blocks.len();
        let mut flags = dead.into_iter();
        script.blocks.blocks.retain(|_| !flags.next().unwrap_or(false));
        before - script.blocks.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::dsl::codegen::tests::compile_str;
    use crate::dsl::ir::{BlockList, Label, LocalMap, SwitchCase, SwitchTable};

    fn optimize(src: &str) -> BinaryScript {
        let mut script = compile_str(src).remove(0);
        Optimizer::new(64).run(&mut script);
        script
    }

    fn opcodes(script: &BinaryScript) -> Vec<String> {
        script.instructions().map(|i| i.opcode.to_string()).collect()
    }

    fn push(v: i32) -> Instruction {
        Instruction::new(CoreOpcode::PushIntConstant, Operand::Int(v))
    }

    fn op(op: CoreOpcode) -> Instruction {
        Instruction::new(op, Operand::Int(0))
    }

    fn label(id: u32) -> Label {
        Label {
            id,
            name: format!("b{id}"),
        }
    }

    fn block(id: u32, instructions: Vec<Instruction>) -> Block {
        Block {
            label: label(id),
            instructions,
        }
    }

    fn script(blocks: Vec<Block>, switch_tables: Vec<SwitchTable>) -> BinaryScript {
        BinaryScript {
            name: "[proc,t]".into(),
            blocks: BlockList { blocks },
            switch_tables,
            locals: LocalMap::default(),
        }
    }

    #[test]
    fn folds_nested_calc() {
        let script = optimize("[proc,a](int) return(calc(2 + 3 * 4 - 10 / 5));");
        assert_eq!(opcodes(&script), ["PUSH_INT_CONSTANT", "RETURN"]);
        assert_eq!(script.instructions().next().unwrap().int_constant(), Some(12));
    }

    #[test]
    fn folding_stops_at_locals() {
        let script = optimize("[proc,a](int $x)(int) return(calc($x + 2 * 3));");
        assert_eq!(opcodes(&script), ["PUSH_INT_LOCAL", "PUSH_INT_CONSTANT", "ADD", "RETURN"]);
    }

    #[test]
    fn division_by_zero_is_kept() {
        let mut b = block(0, vec![push(4), push(0), op(CoreOpcode::Div), push(7), push(0), op(CoreOpcode::Mod)]);
        assert_eq!(ConstantFolding.run(&mut b), 0);
        assert_eq!(b.instructions.len(), 6);
    }

    #[test]
    fn folding_wraps() {
        let mut b = block(0, vec![push(i32::MAX), push(1), op(CoreOpcode::Add)]);
        assert_eq!(ConstantFolding.run(&mut b), 1);
        assert_eq!(b.instructions, vec![push(i32::MIN)]);
    }

    #[test]
    fn branch_after_return_is_dropped() {
        let mut b = block(
            0,
            vec![
                op(CoreOpcode::Return),
                Instruction::new(CoreOpcode::Branch, Operand::Label(label(1))),
            ],
        );
        assert_eq!(DeadBranch.run(&mut b), 1);
        assert_eq!(DeadBranch.run(&mut b), 0);
        assert_eq!(b.instructions.len(), 1);
    }

    #[test]
    fn or_condition_falls_through() {
        let unoptimized = compile_str("[proc,a](int $x) if ($x = 1 | $x = 2) { return; }").remove(0);
        let optimized = optimize("[proc,a](int $x) if ($x = 1 | $x = 2) { return; }");
        let entry = &optimized.blocks.blocks[0];
        assert!(entry.last().unwrap().is(CoreOpcode::BranchEquals));
        assert!(optimized.blocks.len() <= unoptimized.blocks.len());
        assert!(optimized.blocks.iter().any(|b| b.label.name == "or_else"));
    }

    #[test]
    fn unreachable_block_is_removed() {
        let script = optimize("[proc,a] return; def_int $x = 1;");
        assert_eq!(script.blocks.len(), 1);
        assert_eq!(opcodes(&script), ["RETURN"]);
    }

    #[test]
    fn switch_targets_keep_blocks_alive() {
        let table = SwitchTable {
            cases: vec![SwitchCase {
                keys: vec![1],
                label: label(2),
            }],
        };
        let mut s = script(
            vec![
                block(0, vec![op(CoreOpcode::Switch), op(CoreOpcode::Return)]),
                block(1, vec![op(CoreOpcode::Return)]),
                block(2, vec![op(CoreOpcode::Return)]),
            ],
            vec![table],
        );
        assert_eq!(DeadBlock.run(&mut s), 1);
        let ids: Vec<u32> = s.blocks.iter().map(|b| b.label.id).collect();
        assert_eq!(ids, [0, 2]);
    }

    #[test]
    fn fixed_point_respects_ceiling() {
        let mut s = script(
            vec![block(
                0,
                vec![push(1), push(2), op(CoreOpcode::Add), push(3), op(CoreOpcode::Mul), op(CoreOpcode::Return)],
            )],
            Vec::new(),
        );
        let stats = Optimizer::new(1).run(&mut s);
        assert_eq!(stats.iterations, 1);
        assert_eq!(s.blocks.blocks[0].instructions, vec![push(9), op(CoreOpcode::Return)]);
        let stats = Optimizer::new(8).run(&mut s);
        assert_eq!(stats, OptimizeStats { iterations: 1, changes: 0 });
    }

    fn arbitrary_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            (-3..4i32).prop_map(push),
            prop::sample::select(vec![
                CoreOpcode::Add,
                CoreOpcode::Sub,
                CoreOpcode::Mul,
                CoreOpcode::Div,
                CoreOpcode::Mod,
                CoreOpcode::PopIntDiscard,
            ])
            .prop_map(op),
        ]
    }

    /// Blocks ending in a branch, a conditional branch, a return or nothing,
    /// with targets anywhere in the script.
    fn arbitrary_script() -> impl Strategy<Value = BinaryScript> {
        let n = 6u32;
        (
            prop::collection::vec((0..4u8, 0..n), n as usize),
            prop::collection::vec(0..n, 0..3),
        )
            .prop_map(move |(ends, cases)| {
                let blocks = ends
                    .into_iter()
                    .enumerate()
                    .map(|(id, (end, target))| {
                        let id = u32::try_from(id).unwrap();
                        let to = Operand::Label(label(target));
                        let instructions = match end {
                            0 => vec![Instruction::new(CoreOpcode::Branch, to)],
                            1 => vec![Instruction::new(CoreOpcode::BranchIfTrue, to)],
                            2 => vec![op(CoreOpcode::Return)],
                            _ => vec![push(0)],
                        };
                        block(id, instructions)
                    })
                    .collect();
                let table = SwitchTable {
                    cases: cases
                        .into_iter()
                        .zip(0..)
                        .map(|(target, key)| SwitchCase {
                            keys: vec![key],
                            label: label(target),
                        })
                        .collect(),
                };
                script(blocks, vec![table])
            })
    }

    proptest! {
        #[test]
        fn constant_folding_is_idempotent(instructions in prop::collection::vec(arbitrary_instruction(), 0..24)) {
            let mut once = block(0, instructions);
            ConstantFolding.run(&mut once);
            let mut twice = once.clone();
            prop_assert_eq!(ConstantFolding.run(&mut twice), 0);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn dead_block_removal_keeps_targets(mut s in arbitrary_script()) {
            Optimizer::new(16).run(&mut s);
            prop_assert_eq!(s.blocks.blocks[0].label.id, 0);
            for target in s.instructions().filter_map(Instruction::label) {
                prop_assert!(s.blocks.get(target).is_some(), "dangling {}", target);
            }
            for case in s.switch_tables.iter().flat_map(|t| &t.cases) {
                prop_assert!(s.blocks.get(&case.label).is_some(), "dangling case {}", case.label);
            }
        }
    }
}
