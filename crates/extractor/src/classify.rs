//! Symbol classifier
//!
//! Decodes the naming grammar the firmware uses to export its metadata:
//!
//! ```text
//! <ns><path>::<module>                                          module marker
//! <ns><path>::<info>::<field>                                   module field
//! <ns><path>::<inputs>::<input>::<info>::<field>                input field
//! <ns><path>::<procedure>::<proc>::<info>::<field>              procedure field
//! <ns><path>::<procedure>::<proc>::<arguments>::<arg>::<info>::<field>
//! ```
//!
//! `<ns>` and the bracketed markers come from [`MarkerTokens`].

use fwmeta_core::config::MarkerTokens;
use fwmeta_core::{Error, Result, SymbolName};

use crate::descriptive::PayloadField;
use crate::model::ModulePath;

/// Fields a module can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleField {
    Description,
    Callable,
    Address,
}

impl ModuleField {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "description" => Some(Self::Description),
            "callable" => Some(Self::Callable),
            "address" => Some(Self::Address),
            _ => None,
        }
    }
}

/// Fields an input can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputField {
    Description,
    Size,
    Type,
    Callable,
    Address,
}

impl InputField {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "description" => Some(Self::Description),
            "size" => Some(Self::Size),
            "type" => Some(Self::Type),
            "callable" => Some(Self::Callable),
            "address" => Some(Self::Address),
            _ => None,
        }
    }
}

/// Fields a procedure can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureField {
    Description,
    Callable,
}

impl ProcedureField {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "description" => Some(Self::Description),
            "callable" => Some(Self::Callable),
            _ => None,
        }
    }
}

/// Fields a procedure argument can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentField {
    Description,
    Offset,
    Size,
    Type,
}

impl ArgumentField {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "description" => Some(Self::Description),
            "offset" => Some(Self::Offset),
            "size" => Some(Self::Size),
            "type" => Some(Self::Type),
            _ => None,
        }
    }
}

/// What a symbol tells about the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRole {
    /// Declares that a module exists; carries no field
    ModuleMarker(ModulePath),
    Module {
        module: ModulePath,
        field: ModuleField,
    },
    Input {
        module: ModulePath,
        input: String,
        field: InputField,
    },
    Procedure {
        module: ModulePath,
        procedure: String,
        field: ProcedureField,
    },
    Argument {
        module: ModulePath,
        procedure: String,
        argument: String,
        field: ArgumentField,
    },
    Irrelevant,
}

impl SymbolRole {
    /// Fields whose value is a pointer, recovered from relocation records
    pub fn is_reference_field(&self) -> bool {
        matches!(
            self,
            SymbolRole::Module {
                field: ModuleField::Callable | ModuleField::Address,
                ..
            } | SymbolRole::Input {
                field: InputField::Callable | InputField::Address,
                ..
            } | SymbolRole::Procedure {
                field: ProcedureField::Callable,
                ..
            }
        )
    }

    /// Fields whose value is a literal stored in the symbol's own section
    pub fn payload_field(&self) -> Option<PayloadField> {
        match self {
            SymbolRole::Module {
                field: ModuleField::Description,
                ..
            }
            | SymbolRole::Input {
                field: InputField::Description,
                ..
            }
            | SymbolRole::Procedure {
                field: ProcedureField::Description,
                ..
            }
            | SymbolRole::Argument {
                field: ArgumentField::Description,
                ..
            } => Some(PayloadField::Description),
            SymbolRole::Input {
                field: InputField::Size,
                ..
            }
            | SymbolRole::Argument {
                field: ArgumentField::Size,
                ..
            } => Some(PayloadField::Size),
            SymbolRole::Input {
                field: InputField::Type,
                ..
            }
            | SymbolRole::Argument {
                field: ArgumentField::Type,
                ..
            } => Some(PayloadField::Type),
            SymbolRole::Argument {
                field: ArgumentField::Offset,
                ..
            } => Some(PayloadField::Offset),
            _ => None,
        }
    }
}

/// A symbol together with its decoded role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSymbol {
    pub name: SymbolName,
    pub role: SymbolRole,
}

/// Path of the module a marker symbol declares, if `demangled` is one
pub fn discover_module(markers: &MarkerTokens, demangled: &str) -> Option<ModulePath> {
    let rest = demangled.strip_prefix(markers.namespace.as_str())?;
    let marker = format!("::{}", markers.module);
    let end = rest.find(&marker)?;
    ModulePath::parse(&rest[..end])
}

/// Classifies symbols against a fixed set of discovered module paths
pub struct SymbolClassifier<'a> {
    markers: &'a MarkerTokens,
    /// Longest path first so nested modules win over their parents
    paths: Vec<ModulePath>,
}

impl<'a> SymbolClassifier<'a> {
    pub fn new(markers: &'a MarkerTokens, paths: impl IntoIterator<Item = ModulePath>) -> Self {
        let mut paths: Vec<ModulePath> = paths.into_iter().collect();
        paths.sort_by(|a, b| b.as_str().len().cmp(&a.as_str().len()));
        Self { markers, paths }
    }

    pub fn classify(&self, mangled: &str, demangled: &str) -> Result<SymbolRole> {
        let Some(rest) = demangled.strip_prefix(self.markers.namespace.as_str()) else {
            return Ok(SymbolRole::Irrelevant);
        };

        for path in &self.paths {
            let Some(tail) = rest
                .strip_prefix(path.as_str())
                .and_then(|tail| tail.strip_prefix("::"))
            else {
                continue;
            };

            let tokens: Vec<&str> = tail.split("::").collect();
            if let Some(role) = self.match_tokens(mangled, path, &tokens)? {
                return Ok(role);
            }
        }

        Ok(SymbolRole::Irrelevant)
    }

    /// `Ok(None)` when the first token is not a marker, so a shorter
    /// module path can be tried
    fn match_tokens(
        &self,
        mangled: &str,
        path: &ModulePath,
        tokens: &[&str],
    ) -> Result<Option<SymbolRole>> {
        let m = self.markers;
        let module = path.clone();
        let head = tokens[0];

        let role = if head == m.module {
            SymbolRole::ModuleMarker(module)
        } else if head == m.info {
            let [_, field] = tokens else {
                return Err(malformed(mangled, "module info", tokens));
            };
            SymbolRole::Module {
                module,
                field: parse_field(mangled, "module", field, ModuleField::parse)?,
            }
        } else if head == m.inputs {
            let [_, input, info, field] = tokens else {
                return Err(malformed(mangled, "input", tokens));
            };
            if *info != m.info || !is_identifier(input) {
                return Err(malformed(mangled, "input", tokens));
            }
            SymbolRole::Input {
                module,
                input: input.to_string(),
                field: parse_field(mangled, "input", field, InputField::parse)?,
            }
        } else if head == m.procedure {
            match tokens {
                [_, procedure, info, field] if *info == m.info && is_identifier(procedure) => {
                    SymbolRole::Procedure {
                        module,
                        procedure: procedure.to_string(),
                        field: parse_field(mangled, "procedure", field, ProcedureField::parse)?,
                    }
                }
                [_, procedure, arguments, argument, info, field]
                    if *arguments == m.arguments
                        && *info == m.info
                        && is_identifier(procedure)
                        && is_identifier(argument) =>
                {
                    SymbolRole::Argument {
                        module,
                        procedure: procedure.to_string(),
                        argument: argument.to_string(),
                        field: parse_field(mangled, "argument", field, ArgumentField::parse)?,
                    }
                }
                _ => return Err(malformed(mangled, "procedure", tokens)),
            }
        } else {
            return Ok(None);
        };

        Ok(Some(role))
    }
}

fn parse_field<F>(
    mangled: &str,
    owner: &str,
    field: &str,
    parse: impl Fn(&str) -> Option<F>,
) -> Result<F> {
    parse(field).ok_or_else(|| {
        Error::classification(mangled, format!("unknown {} field '{}'", owner, field))
    })
}

fn malformed(mangled: &str, what: &str, tokens: &[&str]) -> Error {
    Error::classification(
        mangled,
        format!("malformed {} declaration '{}'", what, tokens.join("::")),
    )
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
