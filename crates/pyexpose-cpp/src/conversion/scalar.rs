//! Built-in scalar types, their conversion templates and coercion buckets.
//!
//! Scalar types are located in the declaration graph once per build. When a
//! probe namespace is configured, each scalar is pinned by a `type_<name>`
//! typedef inside it; otherwise the fundamental type's spelling is used.

use serde::Serialize;
use tracing::trace;

use pyexpose_core::decl::{DeclGraph, DeclKind, Shape, Ty};
use pyexpose_core::diagnostics::BuildConfig;

use crate::lookup::find;

// ============================================================================
// Coercion Buckets
// ============================================================================

/// Runtime-side classification of a scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Float,
    Int,
    Long,
    Str,
    Unicode,
}

impl Bucket {
    /// Every bucket, in slot order.
    pub const ALL: [Bucket; 5] = [
        Bucket::Float,
        Bucket::Int,
        Bucket::Long,
        Bucket::Str,
        Bucket::Unicode,
    ];

    /// The numeric buckets, in the column order of [`COERCION`].
    pub const NUMERIC: [Bucket; 3] = [Bucket::Float, Bucket::Int, Bucket::Long];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit of this bucket in a coercion presence mask.
    pub fn mask_bit(self) -> u8 {
        match self {
            Bucket::Float => CHECK_FLOAT,
            Bucket::Int => CHECK_INT,
            Bucket::Long => CHECK_LONG,
            Bucket::Str | Bucket::Unicode => 0,
        }
    }
}

pub const CHECK_FLOAT: u8 = 0b100;
pub const CHECK_INT: u8 = 0b010;
pub const CHECK_LONG: u8 = 0b001;

/// A runtime type check applied to a numeric argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericGuard {
    /// Any numeric object.
    Number,
    Float,
    Int,
    Long,
}

impl NumericGuard {
    /// Name of the runtime check function.
    pub fn function(self) -> &'static str {
        match self {
            NumericGuard::Number => "PyNumber_Check",
            NumericGuard::Float => "PyFloat_Check",
            NumericGuard::Int => "PyInt_Check",
            NumericGuard::Long => "PyLong_Check",
        }
    }
}

use NumericGuard::{Float as F, Int as I, Number as N};

/// Guards for the float, int and long branches, indexed by presence mask.
///
/// When only some numeric buckets have overloads, their guards widen so that
/// every numeric argument still reaches one of them.
pub const COERCION: [[Option<NumericGuard>; 3]; 8] = [
    [None, None, None],
    [None, None, Some(N)],
    [None, Some(N), None],
    [None, Some(I), Some(N)],
    [Some(N), None, None],
    [Some(F), None, Some(N)],
    [Some(F), Some(N), None],
    [Some(N), Some(I), Some(N)],
];

/// Guards for the float, int and long branches given the present buckets.
pub fn coercion_guards(mask: u8) -> [Option<NumericGuard>; 3] {
    COERCION[usize::from(mask & 0b111)]
}

// ============================================================================
// Scalar Kinds
// ============================================================================

/// A built-in scalar type with a fixed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    SizeT,
    PySsizeT,
    WChar,
    PyObject,
    CString,
    MutableCString,
    WideCString,
    StdString,
    StdWString,
}

impl Scalar {
    /// Resolution order. Earlier entries win when two scalars share a
    /// canonical type (`size_t` is usually `long unsigned int`).
    pub const ALL: [Scalar; 24] = [
        Scalar::Bool,
        Scalar::Char,
        Scalar::SignedChar,
        Scalar::UnsignedChar,
        Scalar::Short,
        Scalar::UnsignedShort,
        Scalar::Int,
        Scalar::UnsignedInt,
        Scalar::Long,
        Scalar::UnsignedLong,
        Scalar::LongLong,
        Scalar::UnsignedLongLong,
        Scalar::Float,
        Scalar::Double,
        Scalar::LongDouble,
        Scalar::SizeT,
        Scalar::PySsizeT,
        Scalar::WChar,
        Scalar::PyObject,
        Scalar::CString,
        Scalar::MutableCString,
        Scalar::WideCString,
        Scalar::StdString,
        Scalar::StdWString,
    ];

    /// Suffix of the `type_<name>` probe typedef.
    fn probe_name(self) -> Option<&'static str> {
        Some(match self {
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::SignedChar => "schar",
            Scalar::UnsignedChar => "uchar",
            Scalar::Short => "sshort",
            Scalar::UnsignedShort => "ushort",
            Scalar::Int => "sint",
            Scalar::UnsignedInt => "uint",
            Scalar::Long => "slong",
            Scalar::UnsignedLong => "ulong",
            Scalar::LongLong => "slonglong",
            Scalar::UnsignedLongLong => "ulonglong",
            Scalar::Float => "float",
            Scalar::Double => "double",
            Scalar::LongDouble => "long_double",
            Scalar::SizeT => "size_t",
            Scalar::PySsizeT => "py_ssize_t",
            Scalar::WChar => "wchar_t",
            Scalar::PyObject => "pyobject",
            Scalar::StdString => "stdstring",
            Scalar::StdWString => "stdwstring",
            Scalar::CString | Scalar::MutableCString | Scalar::WideCString => return None,
        })
    }

    /// Spelling of the fundamental type in a declaration dump.
    fn fundamental_name(self) -> Option<&'static str> {
        Some(match self {
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::SignedChar => "signed char",
            Scalar::UnsignedChar => "unsigned char",
            Scalar::Short => "short int",
            Scalar::UnsignedShort => "short unsigned int",
            Scalar::Int => "int",
            Scalar::UnsignedInt => "unsigned int",
            Scalar::Long => "long int",
            Scalar::UnsignedLong => "long unsigned int",
            Scalar::LongLong => "long long int",
            Scalar::UnsignedLongLong => "long long unsigned int",
            Scalar::Float => "float",
            Scalar::Double => "double",
            Scalar::LongDouble => "long double",
            Scalar::WChar => "wchar_t",
            _ => return None,
        })
    }

    /// Qualified name to look up when the scalar is not a fundamental type.
    fn declared_name(self) -> Option<&'static str> {
        match self {
            Scalar::SizeT => Some("size_t"),
            Scalar::PySsizeT => Some("Py_ssize_t"),
            Scalar::PyObject => Some("PyObject"),
            Scalar::StdString => Some("std::string"),
            Scalar::StdWString => Some("std::wstring"),
            _ => None,
        }
    }

    /// Native-to-runtime template.
    pub fn to_template(self) -> Option<&'static str> {
        Some(match self {
            Scalar::Bool => "bool_to_py({0})",
            Scalar::Short | Scalar::UnsignedShort | Scalar::Int | Scalar::Long => {
                "PyInt_FromLong({0})"
            }
            Scalar::UnsignedInt => "uint_to_py({0})",
            Scalar::UnsignedLong => "PyLong_FromUnsignedLong({0})",
            Scalar::LongLong => "PyLong_FromLongLong({0})",
            Scalar::UnsignedLongLong => "PyLong_FromUnsignedLongLong({0})",
            Scalar::Float | Scalar::Double => "PyFloat_FromDouble({0})",
            Scalar::LongDouble => "PyFloat_FromDouble(static_cast<double>({0}))",
            Scalar::PyObject => "{0}",
            Scalar::StdString => "string_to_py({0})",
            Scalar::CString => "PyString_FromString({0})",
            _ => return None,
        })
    }

    /// Runtime-to-native template and whether the result may be aliased.
    pub fn from_template(self) -> Option<(&'static str, bool)> {
        Some(match self {
            Scalar::Bool => ("static_cast<bool>(PyObject_IsTrue({0}))", false),
            Scalar::Short => ("py_to_short({0})", false),
            Scalar::UnsignedShort => ("py_to_ushort({0})", false),
            Scalar::Int => ("py_to_int({0})", false),
            Scalar::UnsignedInt => ("py_to_uint({0})", false),
            Scalar::Long => ("py_to_long({0})", false),
            Scalar::UnsignedLong => ("py_to_ulong({0})", false),
            Scalar::LongLong => ("py_to_longlong({0})", false),
            Scalar::UnsignedLongLong => ("py_to_ulonglong({0})", false),
            Scalar::Float => ("static_cast<float>(py_to_double({0}))", false),
            Scalar::Double | Scalar::LongDouble => ("py_to_double({0})", false),
            Scalar::PyObject => ("{0}", true),
            Scalar::CString => ("PyString_AsString({0})", false),
            _ => return None,
        })
    }

    /// Template narrowing a `Py_ssize_t` (a length or index handed over by
    /// the runtime) to this integer type.
    pub fn from_ssize_template(self) -> Option<&'static str> {
        Some(match self {
            Scalar::SignedChar => "py_ssize_t_to_schar({0})",
            Scalar::UnsignedChar => "py_ssize_t_to_uchar({0})",
            Scalar::Char => "py_ssize_t_to_char({0})",
            Scalar::Short => "py_ssize_t_to_sshort({0})",
            Scalar::UnsignedShort => "py_ssize_t_to_ushort({0})",
            Scalar::Int => "py_ssize_t_to_ssint({0})",
            Scalar::UnsignedInt => "py_ssize_t_to_uint({0})",
            Scalar::Long | Scalar::LongLong | Scalar::PySsizeT => "{0}",
            // Py_ssize_t is never wider than long.
            Scalar::UnsignedLong | Scalar::UnsignedLongLong | Scalar::SizeT => {
                "py_ssize_t_to_ulong({0})"
            }
            _ => return None,
        })
    }

    /// Member-storage descriptor for direct slot access.
    pub fn storage(self) -> Option<&'static str> {
        Some(match self {
            Scalar::Short => "T_SHORT",
            Scalar::UnsignedShort => "T_USHORT",
            Scalar::Int => "T_INT",
            Scalar::UnsignedInt => "T_UINT",
            Scalar::Long => "T_LONG",
            Scalar::LongLong => "T_LONGLONG",
            Scalar::UnsignedLongLong => "T_ULONGLONG",
            Scalar::Float => "T_FLOAT",
            Scalar::Double => "T_DOUBLE",
            Scalar::SignedChar => "T_BYTE",
            Scalar::UnsignedChar => "T_UBYTE",
            Scalar::PyObject => "T_OBJECT_EX",
            Scalar::CString | Scalar::MutableCString => "T_STRING",
            Scalar::PySsizeT => "T_PYSSIZET",
            _ => return None,
        })
    }

    /// Coercion bucket; `long int` depends on the platform's integer widths.
    pub fn bucket(self, long_is_wide: bool) -> Option<Bucket> {
        match self {
            Scalar::Float | Scalar::Double | Scalar::LongDouble => Some(Bucket::Float),
            Scalar::Short | Scalar::UnsignedShort | Scalar::Int | Scalar::UnsignedInt => {
                Some(Bucket::Int)
            }
            Scalar::Long if long_is_wide => Some(Bucket::Int),
            Scalar::Long
            | Scalar::UnsignedLong
            | Scalar::SizeT
            | Scalar::LongLong
            | Scalar::UnsignedLongLong => Some(Bucket::Long),
            Scalar::CString | Scalar::StdString => Some(Bucket::Str),
            Scalar::WideCString | Scalar::StdWString => Some(Bucket::Unicode),
            _ => None,
        }
    }

    fn is_long_long(self) -> bool {
        matches!(self, Scalar::LongLong | Scalar::UnsignedLongLong)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Scalar types located in one declaration graph.
#[derive(Debug, Clone, Default)]
pub struct ScalarTypes {
    pub types: Vec<(Scalar, Ty)>,
    /// Whether `long int` is wider than `unsigned int`.
    pub long_is_wide: bool,
}

impl ScalarTypes {
    pub fn get(&self, scalar: Scalar) -> Option<&Ty> {
        self.types
            .iter()
            .find_map(|(s, ty)| (*s == scalar).then_some(ty))
    }

    /// Locate every scalar the graph declares.
    pub fn resolve(graph: &DeclGraph, config: &BuildConfig) -> ScalarTypes {
        let probe = config
            .probe_namespace
            .as_deref()
            .and_then(|ns| find(graph, graph.root(), ns).ok())
            .and_then(|found| found.first().copied());

        let mut types: Vec<(Scalar, Ty)> = Vec::new();
        for scalar in Scalar::ALL {
            let located = match probe {
                Some(ns) => scalar
                    .probe_name()
                    .and_then(|name| find(graph, ns, &format!("type_{name}")).ok())
                    .and_then(|found| found.first().copied())
                    .map(Ty::Node),
                None => locate(graph, scalar),
            };
            let located = located.or_else(|| derived(&types, scalar));
            match located {
                Some(ty) => types.push((scalar, ty)),
                None if scalar.is_long_long() => {
                    trace!(?scalar, "long long scalar not declared");
                }
                None => trace!(?scalar, "scalar not declared"),
            }
        }

        let size = |scalar| {
            let ty = types.iter().find_map(|(s, t)| (*s == scalar).then_some(t))?;
            match graph.shape(ty) {
                Shape::Decl(_, DeclKind::Fundamental(t)) => t.size,
                _ => None,
            }
        };
        let long_is_wide = match (size(Scalar::UnsignedInt), size(Scalar::UnsignedLong)) {
            (Some(uint), Some(ulong)) => uint != ulong,
            _ => config.default_long_is_wide,
        };

        ScalarTypes {
            types,
            long_is_wide,
        }
    }
}

fn locate(graph: &DeclGraph, scalar: Scalar) -> Option<Ty> {
    if let Some(name) = scalar.fundamental_name() {
        return graph
            .ids()
            .find(|id| {
                matches!(graph.kind(*id), DeclKind::Fundamental(t)
                    if t.name.as_deref() == Some(name))
            })
            .map(Ty::Node);
    }
    let name = scalar.declared_name()?;
    let found = find(graph, graph.root(), name).ok()?;
    let id = *found.first()?;
    let ty = Ty::Node(id);
    Some(if scalar == Scalar::PyObject {
        ty.pointer()
    } else {
        ty
    })
}

/// Pointer scalars built from already located character types.
fn derived(types: &[(Scalar, Ty)], scalar: Scalar) -> Option<Ty> {
    let of = |s: Scalar| types.iter().find_map(|(k, t)| (*k == s).then(|| t.clone()));
    match scalar {
        Scalar::CString => of(Scalar::Char).map(|c| c.constant().pointer()),
        Scalar::MutableCString => of(Scalar::Char).map(Ty::pointer),
        Scalar::WideCString => of(Scalar::WChar).map(|c| c.constant().pointer()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coercion_table_rows() {
        assert_eq!(coercion_guards(0), [None, None, None]);
        assert_eq!(coercion_guards(CHECK_LONG), [None, None, Some(N)]);
        assert_eq!(coercion_guards(CHECK_INT), [None, Some(N), None]);
        assert_eq!(
            coercion_guards(CHECK_INT | CHECK_LONG),
            [None, Some(I), Some(N)]
        );
        assert_eq!(coercion_guards(CHECK_FLOAT), [Some(N), None, None]);
        assert_eq!(
            coercion_guards(CHECK_FLOAT | CHECK_LONG),
            [Some(F), None, Some(N)]
        );
        assert_eq!(
            coercion_guards(CHECK_FLOAT | CHECK_INT),
            [Some(F), Some(N), None]
        );
        assert_eq!(
            coercion_guards(CHECK_FLOAT | CHECK_INT | CHECK_LONG),
            [Some(N), Some(I), Some(N)]
        );
    }

    #[test]
    fn test_long_bucket_depends_on_width() {
        assert_eq!(Scalar::Long.bucket(true), Some(Bucket::Int));
        assert_eq!(Scalar::Long.bucket(false), Some(Bucket::Long));
        assert_eq!(Scalar::Bool.bucket(true), None);
    }

    #[test]
    fn test_ssize_narrowing_covers_integers_only() {
        assert_eq!(Scalar::Long.from_ssize_template(), Some("{0}"));
        assert_eq!(
            Scalar::UnsignedLongLong.from_ssize_template(),
            Some("py_ssize_t_to_ulong({0})")
        );
        assert_eq!(Scalar::Double.from_ssize_template(), None);
        assert_eq!(Scalar::CString.from_ssize_template(), None);
    }

    #[test]
    fn test_storage_descriptors() {
        assert_eq!(Scalar::UnsignedChar.storage(), Some("T_UBYTE"));
        assert_eq!(Scalar::MutableCString.storage(), Some("T_STRING"));
        assert_eq!(Scalar::Bool.storage(), None);
    }
}
