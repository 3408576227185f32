use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::ast::Local;
use super::types::StackType;

// ── Opcodes ──────────────────────────────────────────────────────

/// Declares the core opcode set: variant, textual name, default number and
/// whether the operand is written as 4 bytes (`large`) or 1 byte.
macro_rules! define_opcodes {
    ( $( $variant:ident = $name:literal, $code:expr, $large:expr ; )* ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum CoreOpcode {
            $( $variant, )*
        }

        impl CoreOpcode {
            pub const ALL: &'static [CoreOpcode] = &[ $( CoreOpcode::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( CoreOpcode::$variant => $name, )*
                }
            }

            pub fn default_code(self) -> u16 {
                match self {
                    $( CoreOpcode::$variant => $code, )*
                }
            }

            pub fn is_large(self) -> bool {
                match self {
                    $( CoreOpcode::$variant => $large, )*
                }
            }

            pub fn for_name(name: &str) -> Option<CoreOpcode> {
                match name {
                    $( $name => Some(CoreOpcode::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

define_opcodes! {
    PushIntConstant = "PUSH_INT_CONSTANT", 0, true;
    PushVarp = "PUSH_VARP", 1, true;
    PopVarp = "POP_VARP", 2, true;
    PushStringConstant = "PUSH_STRING_CONSTANT", 3, true;
    PushLongConstant = "PUSH_LONG_CONSTANT", 54, true;
    Branch = "BRANCH", 6, true;
    BranchNot = "BRANCH_NOT", 7, true;
    BranchEquals = "BRANCH_EQUALS", 8, true;
    BranchLessThan = "BRANCH_LESS_THAN", 9, true;
    BranchGreaterThan = "BRANCH_GREATER_THAN", 10, true;
    BranchLessThanOrEquals = "BRANCH_LESS_THAN_OR_EQUALS", 31, true;
    BranchGreaterThanOrEquals = "BRANCH_GREATER_THAN_OR_EQUALS", 32, true;
    BranchIfTrue = "BRANCH_IF_TRUE", 1007, true;
    BranchIfFalse = "BRANCH_IF_FALSE", 1008, true;
    LongBranchNot = "LONG_BRANCH_NOT", 1009, true;
    LongBranchEquals = "LONG_BRANCH_EQUALS", 1010, true;
    LongBranchLessThan = "LONG_BRANCH_LESS_THAN", 1011, true;
    LongBranchGreaterThan = "LONG_BRANCH_GREATER_THAN", 1012, true;
    LongBranchLessThanOrEquals = "LONG_BRANCH_LESS_THAN_OR_EQUALS", 1013, true;
    LongBranchGreaterThanOrEquals = "LONG_BRANCH_GREATER_THAN_OR_EQUALS", 1014, true;
    Return = "RETURN", 21, false;
    PushVarpBit = "PUSH_VARP_BIT", 25, true;
    PopVarpBit = "POP_VARP_BIT", 27, true;
    PushIntLocal = "PUSH_INT_LOCAL", 33, true;
    PopIntLocal = "POP_INT_LOCAL", 34, true;
    PushStringLocal = "PUSH_STRING_LOCAL", 35, true;
    PopStringLocal = "POP_STRING_LOCAL", 36, true;
    PushLongLocal = "PUSH_LONG_LOCAL", 55, true;
    PopLongLocal = "POP_LONG_LOCAL", 56, true;
    JoinString = "JOIN_STRING", 37, true;
    PopIntDiscard = "POP_INT_DISCARD", 38, false;
    PopStringDiscard = "POP_STRING_DISCARD", 39, false;
    PopLongDiscard = "POP_LONG_DISCARD", 57, false;
    GosubWithParams = "GOSUB_WITH_PARAMS", 40, true;
    JumpWithParams = "JUMP_WITH_PARAMS", 41, true;
    PushVarcInt = "PUSH_VARC_INT", 42, true;
    PopVarcInt = "POP_VARC_INT", 43, true;
    DefineArray = "DEFINE_ARRAY", 44, true;
    PushArrayInt = "PUSH_ARRAY_INT", 45, true;
    PopArrayInt = "POP_ARRAY_INT", 46, true;
    PushVarcString = "PUSH_VARC_STRING", 47, true;
    PopVarcString = "POP_VARC_STRING", 48, true;
    Switch = "SWITCH", 60, true;
    Add = "ADD", 4000, false;
    Sub = "SUB", 4001, false;
    Mul = "MUL", 4002, false;
    Div = "DIV", 4003, false;
    Mod = "MOD", 4004, false;
}

impl CoreOpcode {
    pub fn push_local(stack: StackType) -> CoreOpcode {
        match stack {
            StackType::Int => CoreOpcode::PushIntLocal,
            StackType::String => CoreOpcode::PushStringLocal,
            StackType::Long => CoreOpcode::PushLongLocal,
        }
    }

    pub fn pop_local(stack: StackType) -> CoreOpcode {
        match stack {
            StackType::Int => CoreOpcode::PopIntLocal,
            StackType::String => CoreOpcode::PopStringLocal,
            StackType::Long => CoreOpcode::PopLongLocal,
        }
    }

    pub fn discard(stack: StackType) -> CoreOpcode {
        match stack {
            StackType::Int => CoreOpcode::PopIntDiscard,
            StackType::String => CoreOpcode::PopStringDiscard,
            StackType::Long => CoreOpcode::PopLongDiscard,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            CoreOpcode::Add | CoreOpcode::Sub | CoreOpcode::Mul | CoreOpcode::Div | CoreOpcode::Mod
        )
    }

    /// Instructions whose label operand is a jump target.
    pub fn is_branch(self) -> bool {
        use CoreOpcode::*;
        matches!(
            self,
            Branch
                | BranchNot
                | BranchEquals
                | BranchLessThan
                | BranchGreaterThan
                | BranchLessThanOrEquals
                | BranchGreaterThanOrEquals
                | BranchIfTrue
                | BranchIfFalse
                | LongBranchNot
                | LongBranchEquals
                | LongBranchLessThan
                | LongBranchGreaterThan
                | LongBranchLessThanOrEquals
                | LongBranchGreaterThanOrEquals
        )
    }
}

/// Numbering of the core opcodes for one target runtime.
#[derive(Debug, Clone)]
pub struct InstructionMap {
    codes: IndexMap<CoreOpcode, u16>,
}

impl Default for InstructionMap {
    fn default() -> Self {
        Self {
            codes: CoreOpcode::ALL.iter().map(|&op| (op, op.default_code())).collect(),
        }
    }
}

impl InstructionMap {
    /// Apply `NAME -> code` overrides. Unknown names are returned.
    pub fn with_overrides(overrides: &IndexMap<String, u16>) -> (Self, Vec<String>) {
        let mut map = Self::default();
        let mut unknown = Vec::new();
        for (name, &code) in overrides {
            match CoreOpcode::for_name(name) {
                Some(op) => {
                    map.codes.insert(op, code);
                }
                None => unknown.push(name.clone()),
            }
        }
        (map, unknown)
    }

    pub fn code(&self, op: CoreOpcode) -> u16 {
        self.codes.get(&op).copied().unwrap_or_else(|| op.default_code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    Core(CoreOpcode),
    /// A native command, `code` being its runtime opcode.
    Command { name: String, code: u16 },
}

impl Opcode {
    pub fn core(&self) -> Option<CoreOpcode> {
        match self {
            Opcode::Core(op) => Some(*op),
            Opcode::Command { .. } => None,
        }
    }

    pub fn is(&self, op: CoreOpcode) -> bool {
        self.core() == Some(op)
    }

    pub fn is_large(&self) -> bool {
        match self {
            Opcode::Core(op) => op.is_large(),
            Opcode::Command { .. } => false,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Core(op) => f.write_str(op.name()),
            Opcode::Command { name, .. } => f.write_str(name),
        }
    }
}

// ── Operands ─────────────────────────────────────────────────────

/// A branch target. Identity is the id; the name only aids reading listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Label {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.id)
    }
}

/// Monotonic label source for one compilation session.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    next: u32,
}

impl LabelGenerator {
    pub fn generate(&mut self, name: &str) -> Label {
        let id = self.next;
        self.next += 1;
        Label {
            id,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRef {
    pub trigger: String,
    pub name: String,
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operand {
    Int(i32),
    Long(i64),
    Str(String),
    Bool(bool),
    Label(Label),
    Local(Local),
    /// Index into the script's switch tables.
    Switch(usize),
    Script(ScriptRef),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Long(v) => write!(f, "{v}L"),
            Operand::Str(s) => write!(f, "{s:?}"),
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::Label(label) => write!(f, "{label}"),
            Operand::Local(local) => write!(f, "${}", local.name),
            Operand::Switch(index) => write!(f, "table{index}"),
            Operand::Script(script) => write!(f, "[{},{}]", script.trigger, script.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: CoreOpcode, operand: Operand) -> Self {
        Self {
            opcode: Opcode::Core(opcode),
            operand,
        }
    }

    pub fn is(&self, op: CoreOpcode) -> bool {
        self.opcode.is(op)
    }

    pub fn label(&self) -> Option<&Label> {
        match &self.operand {
            Operand::Label(label) => Some(label),
            _ => None,
        }
    }

    pub fn int_constant(&self) -> Option<i32> {
        match (&self.operand, self.is(CoreOpcode::PushIntConstant)) {
            (Operand::Int(v), true) => Some(*v),
            _ => None,
        }
    }
}

// ── Blocks ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub label: Label,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            instructions: Vec::new(),
        }
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Whether control never falls out of the end of this block.
    pub fn ends_flow(&self) -> bool {
        self.last()
            .is_some_and(|i| i.is(CoreOpcode::Branch) || i.is(CoreOpcode::Return))
    }
}

/// Insertion-ordered blocks of one script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockList {
    pub blocks: Vec<Block>,
}

impl BlockList {
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn position(&self, label: &Label) -> Option<usize> {
        self.blocks.iter().position(|b| b.label.id == label.id)
    }

    pub fn get(&self, label: &Label) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label.id == label.id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchCase {
    /// Empty for the default case.
    pub keys: Vec<i32>,
    pub label: Label,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchTable {
    pub cases: Vec<SwitchCase>,
}

impl SwitchTable {
    pub fn default_case(&self) -> Option<&SwitchCase> {
        self.cases.iter().find(|c| c.keys.is_empty())
    }

    pub fn entry_count(&self) -> usize {
        self.cases.iter().map(|c| c.keys.len()).sum()
    }
}

// ── Locals ───────────────────────────────────────────────────────

/// Parameters and declared locals of one script, partitioned by stack type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalMap {
    params: [Vec<Local>; 3],
    variables: [Vec<Local>; 3],
}

impl LocalMap {
    pub fn register_param(&mut self, stack: StackType, local: Local) {
        self.params[stack.index()].push(local);
    }

    pub fn register_variable(&mut self, stack: StackType, local: Local) {
        let variables = &mut self.variables[stack.index()];
        if !variables.contains(&local) {
            variables.push(local);
        }
    }

    pub fn params(&self, stack: StackType) -> &[Local] {
        &self.params[stack.index()]
    }

    pub fn variables(&self, stack: StackType) -> &[Local] {
        &self.variables[stack.index()]
    }

    /// Slot of `local` within its stack: parameters first, then declaration order.
    pub fn slot(&self, local: &Local) -> Option<usize> {
        let stack = local.ty.stack_type()?;
        let params = self.params(stack);
        if let Some(index) = params.iter().position(|l| l.id == local.id) {
            return Some(index);
        }
        self.variables(stack)
            .iter()
            .position(|l| l.id == local.id)
            .map(|index| params.len() + index)
    }

    pub fn param_count(&self, stack: StackType) -> usize {
        self.params(stack).len()
    }

    /// Total slots of a stack, parameters included.
    pub fn local_count(&self, stack: StackType) -> usize {
        self.params(stack).len() + self.variables(stack).len()
    }
}

/// Generated code for one script, before serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryScript {
    /// `[trigger,name]`.
    pub name: String,
    pub blocks: BlockList,
    pub switch_tables: Vec<SwitchTable>,
    pub locals: LocalMap,
}

impl BinaryScript {
    /// Every instruction in block order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }
}

impl fmt::Display for BinaryScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for block in self.blocks.iter() {
            writeln!(f, "{}:", block.label)?;
            for instruction in &block.instructions {
                writeln!(f, "    {} {}", instruction.opcode, instruction.operand)?;
            }
        }
        for (index, table) in self.switch_tables.iter().enumerate() {
            writeln!(f, "table{index}:")?;
            for case in &table.cases {
                if case.keys.is_empty() {
                    writeln!(f, "    default -> {}", case.label)?;
                } else {
                    let keys: Vec<String> = case.keys.iter().map(ToString::to_string).collect();
                    writeln!(f, "    {} -> {}", keys.join(", "), case.label)?;
                }
            }
        }
        Ok(())
    }
}
