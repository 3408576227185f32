use std::fmt;

use serde::Serialize;

/// One of the three physical value kinds the runtime stacks distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StackType {
    Int,
    String,
    Long,
}

impl StackType {
    pub const ALL: [StackType; 3] = [StackType::Int, StackType::String, StackType::Long];

    pub fn index(self) -> usize {
        match self {
            StackType::Int => 0,
            StackType::String => 1,
            StackType::Long => 2,
        }
    }
}

/// Binary encodings used when a value is written into a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializer {
    Boolean,
    Byte,
    Short,
    Tribyte,
    Int,
    Long,
    String,
    Type,
}

/// A compile-time value: literal operands, constant values and config property values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    Int(i32),
    Long(i64),
    String(String),
    Bool(bool),
    Type(PrimitiveType),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}L"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Type(t) => write!(f, "{t}"),
        }
    }
}

impl Serializer {
    /// Append `value` in this encoding. Returns `None` when the value kind does not fit.
    pub fn write(self, value: &Value, out: &mut Vec<u8>) -> Option<()> {
        match (self, value) {
            (Serializer::Boolean, Value::Bool(b)) => out.push(u8::from(*b)),
            (Serializer::Byte, v) => out.push(v.as_int()? as u8),
            (Serializer::Short, v) => out.extend_from_slice(&(v.as_int()? as u16).to_be_bytes()),
            (Serializer::Tribyte, v) => {
                let int = v.as_int()?;
                out.extend_from_slice(&((int >> 8) as u16).to_be_bytes());
                out.push((int & 0xff) as u8);
            }
            (Serializer::Int, v) => out.extend_from_slice(&v.as_int()?.to_be_bytes()),
            (Serializer::Long, Value::Long(l)) => out.extend_from_slice(&l.to_be_bytes()),
            (Serializer::String, Value::String(s)) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            (Serializer::Type, Value::Type(t)) => out.push(u8::try_from(u32::from(t.code())).ok()?),
            _ => return None,
        }
        Some(())
    }
}

/// Closed set of primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Undefined,
    Hook,
    Void,
    Byte,
    Short,
    Tribyte,
    Type,
    Param,
    Null,
    Int,
    String,
    Spotanim,
    Seq,
    Stat,
    Synth,
    Coordgrid,
    Char,
    Fontmetrics,
    Maparea,
    Enum,
    Npc,
    Model,
    Interface,
    Component,
    Long,
    Boolean,
    Category,
    Namedobj,
    Obj,
    Inv,
    Texture,
    Mapelement,
    Graphic,
    Struct,
    Loc,
    Colour,
    Idkit,
    Chatphrase,
    Bas,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 39] = [
        PrimitiveType::Undefined,
        PrimitiveType::Hook,
        PrimitiveType::Void,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Tribyte,
        PrimitiveType::Type,
        PrimitiveType::Param,
        PrimitiveType::Null,
        PrimitiveType::Int,
        PrimitiveType::String,
        PrimitiveType::Spotanim,
        PrimitiveType::Seq,
        PrimitiveType::Stat,
        PrimitiveType::Synth,
        PrimitiveType::Coordgrid,
        PrimitiveType::Char,
        PrimitiveType::Fontmetrics,
        PrimitiveType::Maparea,
        PrimitiveType::Enum,
        PrimitiveType::Npc,
        PrimitiveType::Model,
        PrimitiveType::Interface,
        PrimitiveType::Component,
        PrimitiveType::Long,
        PrimitiveType::Boolean,
        PrimitiveType::Category,
        PrimitiveType::Namedobj,
        PrimitiveType::Obj,
        PrimitiveType::Inv,
        PrimitiveType::Texture,
        PrimitiveType::Mapelement,
        PrimitiveType::Graphic,
        PrimitiveType::Struct,
        PrimitiveType::Loc,
        PrimitiveType::Colour,
        PrimitiveType::Idkit,
        PrimitiveType::Chatphrase,
        PrimitiveType::Bas,
    ];

    /// Signature character, also written by `DEFINE_ARRAY` and type-valued config properties.
    pub fn code(self) -> char {
        use PrimitiveType::*;
        match self {
            Undefined => '\u{fff0}',
            Hook => '\u{fff1}',
            Void => '\u{fff2}',
            Byte => '\u{fff3}',
            Short => '\u{fff4}',
            Tribyte => '\u{fff5}',
            Type => '\u{fff6}',
            Param => '\u{ffd0}',
            Null => '\u{ffd7}',
            Int => 'i',
            String => 's',
            Spotanim => 't',
            Seq => 'A',
            Stat => 'S',
            Synth => 'P',
            Coordgrid => 'c',
            Char => 'z',
            Fontmetrics => 'f',
            Maparea => '`',
            Enum => 'g',
            Npc => 'n',
            Model => 'm',
            Interface => 'a',
            Component => 'I',
            Long => '\u{cf}',
            Boolean => '1',
            Category => 'y',
            Namedobj => 'O',
            Obj => 'o',
            Inv => 'v',
            Texture => 'x',
            Mapelement => '\u{b5}',
            Graphic => 'd',
            Struct => 'J',
            Loc => 'l',
            Colour => 'C',
            Idkit => 'K',
            Chatphrase => 'e',
            Bas => '\u{20ac}',
        }
    }

    pub fn representation(self) -> Option<&'static str> {
        use PrimitiveType::*;
        Some(match self {
            Undefined => "undefined",
            Hook => "hook",
            Void => "void",
            Byte => "byte",
            Short => "short",
            Tribyte => "tribyte",
            Type => "type",
            Param => "param",
            Null => return None,
            Int => "int",
            String => "string",
            Spotanim => "spotanim",
            Seq => "seq",
            Stat => "stat",
            Synth => "synth",
            Coordgrid => "coordgrid",
            Char => "char",
            Fontmetrics => "fontmetrics",
            Maparea => "maparea",
            Enum => "enum",
            Npc => "npc",
            Model => "model",
            Interface => "interface",
            Component => "component",
            Long => "long",
            Boolean => "boolean",
            Category => "category",
            Namedobj => "namedobj",
            Obj => "obj",
            Inv => "inv",
            Texture => "texture",
            Mapelement => "mapelement",
            Graphic => "graphic",
            Struct => "struct",
            Loc => "loc",
            Colour => "colour",
            Idkit => "idkit",
            Chatphrase => "chatphrase",
            Bas => "bas",
        })
    }

    pub fn stack_type(self) -> Option<StackType> {
        use PrimitiveType::*;
        match self {
            Undefined | Hook | Void | Byte | Short | Tribyte | Type | Param | Null => None,
            String => Some(StackType::String),
            Long => Some(StackType::Long),
            _ => Some(StackType::Int),
        }
    }

    pub fn default_value(self) -> Option<Value> {
        match self.stack_type()? {
            StackType::String => Some(Value::String(std::string::String::new())),
            StackType::Long => Some(Value::Long(0)),
            StackType::Int => Some(match self {
                PrimitiveType::Int => Value::Int(0),
                PrimitiveType::Boolean => Value::Bool(false),
                _ => Value::Int(-1),
            }),
        }
    }

    pub fn serializer(self) -> Option<Serializer> {
        use PrimitiveType::*;
        Some(match self {
            Undefined | Hook | Void | Param | Null => return None,
            Byte | Char | Texture => Serializer::Byte,
            Tribyte => Serializer::Tribyte,
            Type => Serializer::Type,
            Int | Spotanim | Coordgrid | Fontmetrics | Maparea | Component => Serializer::Int,
            String => Serializer::String,
            Long => Serializer::Long,
            Boolean => Serializer::Boolean,
            _ => Serializer::Short,
        })
    }

    fn widened(self) -> PrimitiveType {
        match self {
            PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Tribyte => PrimitiveType::Int,
            other => other,
        }
    }

    /// Equality used by type checking; raw integer encodings compare as `int`.
    pub fn implicit_equals(self, other: PrimitiveType) -> bool {
        self.widened() == other.widened()
    }

    /// Whether the type name may be written in source (`int`, `obj`, ...).
    pub fn is_referencable(self) -> bool {
        use PrimitiveType::*;
        !matches!(self, Hook | Undefined | Byte | Short | Tribyte | Type) && self.representation().is_some()
    }

    pub fn is_declarable(self) -> bool {
        self.stack_type().is_some()
    }

    pub fn is_arrayable(self) -> bool {
        self != PrimitiveType::Boolean && self.stack_type() == Some(StackType::Int)
    }

    pub fn is_config_type(self) -> bool {
        use PrimitiveType::*;
        matches!(
            self,
            Seq | Stat | Maparea | Enum | Npc | Category | Namedobj | Obj | Inv | Mapelement | Struct | Loc | Param | Spotanim
        )
    }

    /// Lookup by source representation, restricted to referencable types.
    pub fn for_representation(text: &str) -> Option<PrimitiveType> {
        Self::ALL
            .into_iter()
            .find(|t| t.is_referencable() && t.representation() == Some(text))
    }

    /// Lookup by representation including internal types, used for binding and command tables.
    pub fn for_name(text: &str) -> Option<PrimitiveType> {
        Self::ALL.into_iter().find(|t| t.representation() == Some(text))
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.representation().unwrap_or("null"))
    }
}

/// A primitive type or a tuple of them (multi-value returns and argument lists).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Primitive(PrimitiveType),
    Tuple(Vec<PrimitiveType>),
}

impl Type {
    pub const VOID: Type = Type::Primitive(PrimitiveType::Void);
    pub const UNDEFINED: Type = Type::Primitive(PrimitiveType::Undefined);

    pub fn from_flat(mut types: Vec<PrimitiveType>) -> Type {
        match types.len() {
            0 => Type::VOID,
            1 => Type::Primitive(types.remove(0)),
            _ => Type::Tuple(types),
        }
    }

    /// Ordered primitives this type occupies on the stacks. `void` flattens to nothing.
    pub fn flatten(&self) -> Vec<PrimitiveType> {
        match self {
            Type::Primitive(PrimitiveType::Void) => Vec::new(),
            Type::Primitive(p) => vec![*p],
            Type::Tuple(items) => items.clone(),
        }
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            Type::Primitive(p) => Some(*p),
            Type::Tuple(_) => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Undefined))
    }

    /// Element-wise implicit equality over the flattened forms.
    pub fn implicit_equals(&self, other: &Type) -> bool {
        let lhs = self.flatten();
        let rhs = other.flatten();
        lhs.len() == rhs.len() && lhs.iter().zip(&rhs).all(|(a, b)| a.implicit_equals(*b))
    }
}

impl From<PrimitiveType> for Type {
    fn from(value: PrimitiveType) -> Self {
        Type::Primitive(value)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::Tuple(items) => {
                let names: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", names.join(","))
            }
        }
    }
}
