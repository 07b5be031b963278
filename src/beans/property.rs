//! Field-by-field bean state writer and reader.
//!
//! Each relevant field is preceded by a marker byte. A field that cannot be
//! written is reported and marked as skipped, so the reader stays aligned and
//! leaves that field at its blank value.

use std::cell::RefCell;
use std::rc::Rc;

use cc_serialize::{CodecError, CodecResult, Decoder, Encoder, ProblemKind};

use super::descriptor::{Bean, BeanType, Instantiation};
use super::relevant_fields::RelevantField;
use super::value::{BeanRef, BeanValue};
use crate::serialization::{ReadContext, WriteContext};

pub const FIELD_SKIPPED: u8 = 0;
pub const FIELD_PRESENT: u8 = 1;

pub trait BeanStateWriter {
    fn write_state(&self, ctx: &mut WriteContext<'_>, bean: &dyn Bean) -> CodecResult<()>;
}

pub trait BeanStateReader {
    /// Creates the instance whose state is read next.
    fn new_bean(&self, ctx: &ReadContext<'_>) -> CodecResult<BeanRef>;

    fn read_state(&self, ctx: &mut ReadContext<'_>, bean: &BeanRef) -> CodecResult<()>;
}

/// Creates instances of generated types, which have no blank constructor of
/// their own.
pub trait InstantiationScheme {
    fn deserialization_instance(&self, ty: &'static BeanType) -> Option<Box<dyn Bean>>;
}

fn missing_part(ty: &BeanType, declaring: &BeanType) -> CodecError {
    CodecError::Format(format!(
        "`{}` bean has no part declared by `{}`",
        ty.name, declaring.name
    ))
}

pub struct BeanPropertyWriter {
    bean_type: &'static BeanType,
    fields: Rc<[RelevantField]>,
}

impl BeanPropertyWriter {
    pub fn new(bean_type: &'static BeanType, fields: Rc<[RelevantField]>) -> Self {
        Self { bean_type, fields }
    }

    /// The value to persist: the field itself, or its convention value while
    /// the field was not set explicitly.
    fn field_value(&self, bean: &dyn Bean, relevant: &RelevantField) -> CodecResult<BeanValue> {
        let part = bean
            .declared_part(relevant.declaring)
            .ok_or_else(|| missing_part(self.bean_type, relevant.declaring))?;
        let value = (relevant.field.get)(part).ok_or_else(|| missing_part(self.bean_type, relevant.declaring))?;

        let (Some(flag), Some(convention)) = (relevant.explicit_flag, self.bean_type.convention_source()) else {
            return Ok(value);
        };
        if (flag.get)(part) != Some(BeanValue::Boolean(false)) {
            return Ok(value);
        }
        Ok(convention(bean, relevant.name())
            .filter(|replacement| relevant.field.field_type.accepts(replacement))
            .unwrap_or(value))
    }
}

impl BeanStateWriter for BeanPropertyWriter {
    fn write_state(&self, ctx: &mut WriteContext<'_>, bean: &dyn Bean) -> CodecResult<()> {
        for relevant in self.fields.iter() {
            let trace = ctx.trace().field(relevant.name());

            if let Some(type_name) = relevant.unsupported {
                ctx.with_trace(trace, |ctx| {
                    ctx.report(
                        ProblemKind::UnsupportedFieldType,
                        format!("cannot serialize a field of type `{type_name}`"),
                    )
                });
                ctx.write_byte(FIELD_SKIPPED)?;
                continue;
            }

            let value = self.field_value(bean, relevant)?;
            match ctx.codec().check(&value) {
                Ok(()) => {
                    ctx.write_byte(FIELD_PRESENT)?;
                    ctx.with_trace(trace, |ctx| ctx.write_value(&value))?;
                }
                Err(err) if err.is_io() => return Err(err),
                Err(err) => {
                    ctx.with_trace(trace, |ctx| ctx.report(ProblemKind::CannotWrite, err.to_string()));
                    ctx.write_byte(FIELD_SKIPPED)?;
                }
            }
        }
        Ok(())
    }
}

pub struct BeanPropertyReader {
    bean_type: &'static BeanType,
    fields: Rc<[RelevantField]>,
}

impl BeanPropertyReader {
    pub fn new(bean_type: &'static BeanType, fields: Rc<[RelevantField]>) -> Self {
        Self { bean_type, fields }
    }
}

impl BeanStateReader for BeanPropertyReader {
    fn new_bean(&self, ctx: &ReadContext<'_>) -> CodecResult<BeanRef> {
        let bean = match self.bean_type.instantiation {
            Instantiation::Blank(create) => create(),
            Instantiation::Generated => ctx
                .scheme()
                .and_then(|scheme| scheme.deserialization_instance(self.bean_type))
                .ok_or_else(|| {
                    CodecError::Unsupported(format!(
                        "no instantiation scheme can create `{}`",
                        self.bean_type.name
                    ))
                })?,
        };
        Ok(Rc::new(RefCell::new(bean)))
    }

    fn read_state(&self, ctx: &mut ReadContext<'_>, bean: &BeanRef) -> CodecResult<()> {
        for relevant in self.fields.iter() {
            match ctx.read_byte()? {
                FIELD_SKIPPED => continue,
                FIELD_PRESENT => {}
                tag => {
                    return Err(CodecError::UnexpectedTag {
                        tag,
                        context: "field marker",
                    })
                }
            }

            let trace = ctx.trace().field(relevant.name());
            let value = ctx
                .with_trace(trace.clone(), |ctx| ctx.read_value())
                .map_err(|err| match err {
                    err @ CodecError::PropertyLoad { .. } => err,
                    err if err.is_io() => err,
                    err => CodecError::PropertyLoad {
                        trace: trace.clone(),
                        source: Box::new(err),
                    },
                })?;

            let field_type = relevant.field.field_type;
            if !field_type.accepts(&value) {
                let message = format!("a {} value is not assignable to a field of type {field_type}", value.kind());
                ctx.with_trace(trace, |ctx| ctx.report(ProblemKind::IncompatibleValue, message));
                continue;
            }

            let kind = value.kind();
            let assigned = {
                let mut target = bean.try_borrow_mut().map_err(|_| {
                    CodecError::Format(format!("`{}` bean is borrowed while being read", self.bean_type.name))
                })?;
                match target.declared_part_mut(relevant.declaring) {
                    Some(part) => (relevant.field.set)(part, value),
                    None => return Err(missing_part(self.bean_type, relevant.declaring)),
                }
            };
            if !assigned {
                ctx.with_trace(trace, |ctx| {
                    ctx.report(
                        ProblemKind::IncompatibleValue,
                        format!("a {kind} value could not be stored in a field of type {field_type}"),
                    )
                });
            }
        }
        Ok(())
    }
}
