//! In-process interpreter for a generated surface.
//!
//! [`OpaqueApi::invoke`] executes any routine of a [`Surface`] by name, with
//! the semantics the emitted SQL functions delegate to. Documents are
//! NumberJSON; a NULL document reads as an empty message.

use std::collections::HashMap;
use std::sync::Arc;

use protosql_descriptor::{DescriptorIndex, EnumDescriptor, FieldDescriptor, MessageDescriptor};
use protosql_runtime::codec::{self, DecodeOptions};
use protosql_runtime::error::{Error, ErrorKind, Result};
use protosql_runtime::proto_json::{self, JsonParseOptions, JsonPrintOptions};
use protosql_runtime::routine::{json_from_sql, sql_from_json, SqlValue};
use protosql_runtime::{fields, value};
use serde_json::Value;
use tracing::trace;

use crate::config::GenerateConfig;
use crate::surface::{Accessor, Routine, Surface, Target};

pub struct OpaqueApi {
    index: Arc<DescriptorIndex>,
    /// Routine name → (owning type, routine).
    routines: HashMap<String, (String, Routine)>,
}

impl OpaqueApi {
    pub fn new(index: Arc<DescriptorIndex>, surface: &Surface) -> Self {
        let routines = surface
            .routines()
            .map(|(ty, r)| (r.name.clone(), (ty.full_name.clone(), r.clone())))
            .collect();
        Self { index, routines }
    }

    /// Builds the surface for `files` and wraps it.
    pub fn generate(
        index: Arc<DescriptorIndex>,
        files: &[String],
        config: &GenerateConfig,
    ) -> crate::Result<Self> {
        let surface = Surface::build(&index, files, config)?;
        Ok(Self::new(index, &surface))
    }

    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.get(name).map(|(_, r)| r)
    }

    pub fn invoke(&self, name: &str, args: &[SqlValue]) -> Result<SqlValue> {
        let (type_name, routine) = self.routines.get(name).ok_or_else(|| {
            Error::new(ErrorKind::UnknownType, format!("routine {name} is not defined"))
        })?;
        if args.len() != routine.params.len() {
            return Err(Error::new(
                ErrorKind::TypeMismatch,
                format!(
                    "{name} takes {} argument(s), got {}",
                    routine.params.len(),
                    args.len()
                ),
            ));
        }
        trace!(routine = %name, "invoke");

        let result = match routine.target {
            Target::Enum => {
                let e = self
                    .index
                    .enum_type(type_name)
                    .ok_or_else(|| unknown_type(type_name))?;
                enum_routine(e, routine.accessor, &args[0])
            }
            _ => {
                let message = self
                    .index
                    .message(type_name)
                    .ok_or_else(|| unknown_type(type_name))?;
                Call {
                    index: &self.index,
                    message,
                    args,
                }
                .run(routine)
            }
        };
        result.map_err(|e| e.at(name))
    }
}

fn unknown_type(type_name: &str) -> Error {
    Error::new(ErrorKind::UnknownType, format!("type {type_name} is not defined"))
}

fn enum_routine(e: &EnumDescriptor, accessor: Accessor, arg: &SqlValue) -> Result<SqlValue> {
    if arg.is_null() {
        return Ok(SqlValue::Null);
    }
    Ok(match accessor {
        Accessor::FromString => match arg {
            SqlValue::Text(name) => e.number_of(name).map_or(SqlValue::Null, |n| SqlValue::Int(n.into())),
            other => {
                return Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!("expected an enum name, got {other}"),
                ))
            }
        },
        _ => {
            let number = i32::try_from(arg.as_i64()?).map_err(|_| {
                Error::new(ErrorKind::RangeError, format!("{arg} is not an enum number"))
            })?;
            e.name_of(number)
                .map_or(SqlValue::Null, |name| SqlValue::Text(name.to_string()))
        }
    })
}

struct Call<'a> {
    index: &'a DescriptorIndex,
    message: &'a MessageDescriptor,
    args: &'a [SqlValue],
}

impl Call<'_> {
    fn doc(&self) -> Result<Value> {
        self.args[0].to_json()
    }

    fn arg(&self, i: usize) -> &SqlValue {
        &self.args[i]
    }

    fn run(&self, routine: &Routine) -> Result<SqlValue> {
        match routine.target {
            Target::Message => self.message_routine(routine.accessor),
            Target::Field(number) => {
                let field = self.message.field(number).ok_or_else(|| {
                    Error::new(
                        ErrorKind::UnknownField,
                        format!("{} has no field {number}", self.message.full_name),
                    )
                })?;
                self.field_routine(field, routine.accessor)
            }
            Target::Oneof(i) => self.oneof_routine(i, routine.accessor),
            Target::Enum => Err(Error::new(
                ErrorKind::TypeMismatch,
                "enum routine invoked on a message",
            )),
        }
    }

    fn message_routine(&self, accessor: Accessor) -> Result<SqlValue> {
        if accessor == Accessor::New {
            return Ok(SqlValue::Json(Value::Object(Default::default())));
        }
        let input = self.arg(0);
        if input.is_null() {
            return Ok(SqlValue::Null);
        }
        let (index, message) = (self.index, self.message);
        Ok(match accessor {
            Accessor::ToProtobuf => SqlValue::Blob(codec::encode(index, message, &self.doc()?)?),
            Accessor::FromProtobuf => {
                let SqlValue::Blob(wire) = input else {
                    return Err(Error::new(
                        ErrorKind::TypeMismatch,
                        format!("expected wire bytes, got {input}"),
                    ));
                };
                SqlValue::Json(codec::decode(index, message, wire, &DecodeOptions::round_trip())?)
            }
            Accessor::ToJson => {
                let json = proto_json::to_proto_json(
                    index,
                    message,
                    &self.doc()?,
                    &JsonPrintOptions::default(),
                )?;
                SqlValue::Text(serde_json::to_string(&json)?)
            }
            Accessor::FromJson => SqlValue::Json(proto_json::from_proto_json(
                index,
                message,
                &input.to_json()?,
                &JsonParseOptions::default(),
            )?),
            other => {
                return Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!("{other:?} is not a message routine"),
                ))
            }
        })
    }

    fn field_routine(&self, field: &FieldDescriptor, accessor: Accessor) -> Result<SqlValue> {
        let (number, kind) = (field.number, field.kind);
        let doc = self.doc()?;
        let out = |doc: Value| -> Result<SqlValue> { Ok(SqlValue::Json(doc)) };

        match accessor {
            Accessor::Get => {
                let stored = fields::get_or(&doc, number, kind, Value::Null)?;
                let v = match stored {
                    Value::Null => value::field_default(self.index, field)?,
                    v => v,
                };
                sql_from_json(kind, v)
            }
            Accessor::GetOr => {
                if !fields::has(&doc, number)? {
                    return Ok(self.arg(1).clone());
                }
                sql_from_json(kind, fields::get(&doc, number, kind)?)
            }
            Accessor::Set => {
                let v = self.arg(1);
                if v.is_null() {
                    return out(fields::clear(doc, number)?);
                }
                let v = json_from_sql(kind, v)?;
                let siblings = self.message.oneof_siblings(field);
                out(fields::set_oneof(doc, number, kind, &v, &siblings)?)
            }
            Accessor::Has => Ok(SqlValue::Bool(fields::has(&doc, number)?)),
            Accessor::Clear | Accessor::ClearAll => out(fields::clear(doc, number)?),

            Accessor::GetAsName | Accessor::GetAsNameOr => {
                let e = self.enum_of(field)?;
                if accessor == Accessor::GetAsNameOr && !fields::has(&doc, number)? {
                    return Ok(self.arg(1).clone());
                }
                let n = match fields::get_or(&doc, number, kind, Value::Null)? {
                    Value::Null => value::field_default(self.index, field)?,
                    v => v,
                };
                let n = value::as_i32(kind, &n)?;
                Ok(e.name_of(n)
                    .map_or(SqlValue::Null, |name| SqlValue::Text(name.to_string())))
            }
            Accessor::SetFromName => {
                let e = self.enum_of(field)?;
                let name = match self.arg(1) {
                    SqlValue::Null => return out(fields::clear(doc, number)?),
                    SqlValue::Text(name) => name,
                    other => {
                        return Err(Error::new(
                            ErrorKind::TypeMismatch,
                            format!("expected an enum name, got {other}"),
                        ))
                    }
                };
                let n = e.number_of(name).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidEnumName,
                        format!("{name} is not a value of {}", e.full_name),
                    )
                })?;
                let siblings = self.message.oneof_siblings(field);
                out(fields::set_oneof(doc, number, kind, &Value::from(n), &siblings)?)
            }

            Accessor::GetAll => Ok(SqlValue::Json(fields::get_all(&doc, number, kind)?)),
            Accessor::SetAll => match self.arg(1) {
                SqlValue::Null => out(fields::clear(doc, number)?),
                list => out(fields::set_all(doc, number, kind, &list.to_json()?)?),
            },
            Accessor::Add => {
                let v = json_from_sql(kind, self.arg(1))?;
                out(fields::add(doc, number, kind, &v)?)
            }
            Accessor::AddAll => match self.arg(1) {
                SqlValue::Null => out(doc),
                list => out(fields::add_all(doc, number, kind, &list.to_json()?)?),
            },
            Accessor::Count => Ok(SqlValue::Int(fields::count(&doc, number)? as i64)),
            Accessor::GetAt => {
                let i = self.arg(1).as_i64()?;
                sql_from_json(kind, fields::get_at(&doc, number, kind, i)?)
            }
            Accessor::SetAt => {
                let i = self.arg(1).as_i64()?;
                let v = json_from_sql(kind, self.arg(2))?;
                out(fields::set_at(doc, number, kind, i, &v)?)
            }
            Accessor::InsertAt => {
                let i = self.arg(1).as_i64()?;
                let v = json_from_sql(kind, self.arg(2))?;
                out(fields::insert_at(doc, number, kind, i, &v)?)
            }
            Accessor::RemoveAt => {
                let i = self.arg(1).as_i64()?;
                out(fields::remove_at(doc, number, i)?)
            }
            other => Err(Error::new(
                ErrorKind::TypeMismatch,
                format!("{other:?} is not a field routine"),
            )),
        }
    }

    fn oneof_routine(&self, i: usize, accessor: Accessor) -> Result<SqlValue> {
        let oneof = self.message.oneofs.get(i).ok_or_else(|| {
            Error::new(
                ErrorKind::DescriptorMismatch,
                format!("{} has no oneof #{i}", self.message.full_name),
            )
        })?;
        let doc = self.doc()?;
        match accessor {
            Accessor::Which => {
                let members: Vec<(u32, &str)> = oneof
                    .fields
                    .iter()
                    .filter_map(|&n| self.message.field(n).map(|f| (n, f.name.as_str())))
                    .collect();
                Ok(fields::which(&doc, &members)?
                    .map_or(SqlValue::Null, |name| SqlValue::Text(name.to_string())))
            }
            _ => Ok(SqlValue::Json(fields::clear_oneof(doc, &oneof.fields)?)),
        }
    }

    fn enum_of(&self, field: &FieldDescriptor) -> Result<&EnumDescriptor> {
        self.index.enum_type_of(field).ok_or_else(|| {
            Error::new(
                ErrorKind::DescriptorMismatch,
                format!("field {} is not an enum", field.name),
            )
        })
    }
}
