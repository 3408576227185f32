use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use super::ir::{BinaryScript, InstructionMap, Label, Opcode, Operand};
use super::types::StackType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// A label, local or switch table the generator referenced does not exist.
    UnresolvedOperand(String),
    LongUnsupported,
    OperandOutOfRange { opcode: String, value: i32 },
    TooManySwitchTables(usize),
    TooLarge(&'static str),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::UnresolvedOperand(what) => write!(f, "Unresolved operand: {what}"),
            WriteError::LongUnsupported => write!(f, "Long operands are not supported by the target runtime"),
            WriteError::OperandOutOfRange { opcode, value } => {
                write!(f, "Operand {value} of {opcode} does not fit in one byte")
            }
            WriteError::TooManySwitchTables(count) => write!(f, "Too many switch tables: {count}"),
            WriteError::TooLarge(what) => write!(f, "Script is too large: {what}"),
        }
    }
}

impl std::error::Error for WriteError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedOperand {
    Int(i32),
    Long(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    pub code: u16,
    pub large: bool,
    pub operand: ResolvedOperand,
}

/// A script with every symbolic operand replaced by its final value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytecode {
    pub name: String,
    pub instructions: Vec<ResolvedInstruction>,
    /// Parameter counts per stack, in `StackType::ALL` order.
    pub params: [usize; 3],
    /// Local counts per stack, parameters included.
    pub locals: [usize; 3],
    /// `key -> relative offset`, in the order their `SWITCH` instructions appear.
    pub switch_tables: Vec<IndexMap<i32, i32>>,
}

/// Address of each block's first instruction.
fn address_table(script: &BinaryScript) -> HashMap<u32, usize> {
    let mut table = HashMap::new();
    let mut address = 0;
    for block in script.blocks.iter() {
        table.insert(block.label.id, address);
        address += block.instructions.len();
    }
    table
}

fn relative(addresses: &HashMap<u32, usize>, label: &Label, address: usize) -> Result<i32, WriteError> {
    let target = addresses
        .get(&label.id)
        .ok_or_else(|| WriteError::UnresolvedOperand(format!("label {label}")))?;
    let offset = i64::try_from(*target).unwrap_or(i64::MAX) - i64::try_from(address).unwrap_or(i64::MAX) - 1;
    i32::try_from(offset).map_err(|_| WriteError::TooLarge("jump offset"))
}

/// Resolve labels to relative offsets, locals to slots, switch tables to
/// table indices and scripts to ids.
pub fn resolve(script: &BinaryScript, map: &InstructionMap) -> Result<Bytecode, WriteError> {
    let addresses = address_table(script);
    let mut switch_tables = Vec::new();
    let mut instructions = Vec::with_capacity(script.blocks.instruction_count());

    for (address, instruction) in script.instructions().enumerate() {
        let operand = match &instruction.operand {
            Operand::Int(v) => ResolvedOperand::Int(*v),
            Operand::Long(v) => ResolvedOperand::Long(*v),
            Operand::Str(s) => ResolvedOperand::Str(s.clone()),
            Operand::Bool(b) => ResolvedOperand::Int(i32::from(*b)),
            Operand::Label(label) => ResolvedOperand::Int(relative(&addresses, label, address)?),
            Operand::Local(local) => {
                let slot = script
                    .locals
                    .slot(local)
                    .ok_or_else(|| WriteError::UnresolvedOperand(format!("local ${}", local.name)))?;
                ResolvedOperand::Int(i32::try_from(slot).map_err(|_| WriteError::TooLarge("local slot"))?)
            }
            Operand::Switch(index) => {
                let table = script
                    .switch_tables
                    .get(*index)
                    .ok_or_else(|| WriteError::UnresolvedOperand(format!("switch table {index}")))?;
                let mut jumps = IndexMap::new();
                for case in &table.cases {
                    let jump = relative(&addresses, &case.label, address)?;
                    for &key in &case.keys {
                        jumps.insert(key, jump);
                    }
                }
                let resolved = i32::try_from(switch_tables.len()).map_err(|_| WriteError::TooLarge("switch index"))?;
                switch_tables.push(jumps);
                ResolvedOperand::Int(resolved)
            }
            Operand::Script(target) => ResolvedOperand::Int(target.id),
        };
        let code = match &instruction.opcode {
            Opcode::Core(op) => map.code(*op),
            Opcode::Command { code, .. } => *code,
        };
        instructions.push(ResolvedInstruction {
            code,
            large: instruction.opcode.is_large(),
            operand,
        });
    }

    Ok(Bytecode {
        name: script.name.clone(),
        instructions,
        params: StackType::ALL.map(|stack| script.locals.param_count(stack)),
        locals: StackType::ALL.map(|stack| script.locals.local_count(stack)),
        switch_tables,
    })
}

fn write_u16(out: &mut Vec<u8>, value: usize, what: &'static str) -> Result<(), WriteError> {
    let value = u16::try_from(value).map_err(|_| WriteError::TooLarge(what))?;
    out.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

impl Bytecode {
    /// Serialize in the runtime's big-endian layout. When longs are not
    /// supported the long counts are omitted and long operands are rejected.
    pub fn encode(&self, supports_long: bool) -> Result<Vec<u8>, WriteError> {
        if !supports_long && (self.locals[2] > 0 || self.params[2] > 0) {
            return Err(WriteError::LongUnsupported);
        }
        let mut out = Vec::new();
        write_string(&mut out, &self.name);
        for instruction in &self.instructions {
            out.extend_from_slice(&instruction.code.to_be_bytes());
            match &instruction.operand {
                ResolvedOperand::Str(s) => write_string(&mut out, s),
                ResolvedOperand::Long(_) if !supports_long => return Err(WriteError::LongUnsupported),
                ResolvedOperand::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
                ResolvedOperand::Int(v) if instruction.large => out.extend_from_slice(&v.to_be_bytes()),
                ResolvedOperand::Int(v) => {
                    let byte = u8::try_from(*v).map_err(|_| WriteError::OperandOutOfRange {
                        opcode: instruction.code.to_string(),
                        value: *v,
                    })?;
                    out.push(byte);
                }
            }
        }
        let count = u32::try_from(self.instructions.len()).map_err(|_| WriteError::TooLarge("instruction count"))?;
        out.extend_from_slice(&count.to_be_bytes());

        let stacks = if supports_long { 3 } else { 2 };
        for &count in self.locals.iter().take(stacks) {
            write_u16(&mut out, count, "local count")?;
        }
        for &count in self.params.iter().take(stacks) {
            write_u16(&mut out, count, "parameter count")?;
        }

        let tables = u8::try_from(self.switch_tables.len())
            .map_err(|_| WriteError::TooManySwitchTables(self.switch_tables.len()))?;
        out.push(tables);
        let mut size = 1;
        for table in &self.switch_tables {
            write_u16(&mut out, table.len(), "switch table entries")?;
            for (key, offset) in table {
                out.extend_from_slice(&key.to_be_bytes());
                out.extend_from_slice(&offset.to_be_bytes());
            }
            size += 2 + table.len() * 8;
        }
        write_u16(&mut out, size, "switch section")?;
        debug!(script = %self.name, bytes = out.len(), "bytecode written");
        Ok(out)
    }
}

/// Resolve and serialize `script` in one step.
pub fn write_script(script: &BinaryScript, map: &InstructionMap, supports_long: bool) -> Result<Vec<u8>, WriteError> {
    resolve(script, map)?.encode(supports_long)
}
