//! Tagged encoding of field values.
//!
//! Every value starts with a one-byte tag. A bean is written as its type name
//! the first time it is met and as a back reference to its id afterwards,
//! which keeps shared and cyclic references intact. Its field values follow
//! later in the stream, once the enclosing root value is complete.

use cc_serialize::{CodecError, CodecResult, Decoder, Encoder};

use super::value::{bean_address, BeanRef, BeanValue};
use crate::serialization::{ReadContext, WriteContext};

pub trait ValueCodec {
    /// Fails if `value` cannot be written, before anything reaches the stream.
    fn check(&self, value: &BeanValue) -> CodecResult<()>;

    fn write(&self, ctx: &mut WriteContext<'_>, value: &BeanValue) -> CodecResult<()>;

    fn read(&self, ctx: &mut ReadContext<'_>) -> CodecResult<BeanValue>;
}

mod tag {
    pub const NULL: u8 = 0;
    pub const TRUE: u8 = 1;
    pub const FALSE: u8 = 2;
    pub const INT: u8 = 3;
    pub const LONG: u8 = 4;
    pub const DOUBLE: u8 = 5;
    pub const STRING: u8 = 6;
    pub const LIST: u8 = 7;
    pub const ENUM: u8 = 8;
    pub const BEAN: u8 = 9;
    pub const BEAN_REF: u8 = 10;
}

/// Upper bound on the capacity reserved up front for a list read from the
/// stream.
const MAX_LIST_RESERVATION: usize = 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueCodec;

impl DefaultValueCodec {
    fn write_bean(&self, ctx: &mut WriteContext<'_>, bean: &BeanRef) -> CodecResult<()> {
        let address = bean_address(bean);
        if let Some(id) = ctx.identities().get_id(address) {
            ctx.write_byte(tag::BEAN_REF)?;
            return ctx.write_small_int(id);
        }
        ctx.identities().put(address);

        let ty = bean
            .try_borrow()
            .map_err(|_| CodecError::Format("bean is mutably borrowed while being written".to_string()))?
            .bean_type();
        ctx.write_byte(tag::BEAN)?;
        ctx.write_string(ty.name)?;

        let trace = ctx.trace().bean(ty.name);
        ctx.defer_state(bean, trace);
        Ok(())
    }

    fn read_bean(&self, ctx: &mut ReadContext<'_>) -> CodecResult<BeanValue> {
        let name = ctx.read_string()?;
        let ty = ctx
            .registry()
            .bean_type(&name)
            .ok_or_else(|| CodecError::Format(format!("unknown bean type `{name}`")))?;

        let reader = ctx.beans().reader_for(ty);
        let bean = reader.new_bean(ctx)?;
        ctx.register_bean(&bean);

        let trace = ctx.trace().bean(ty.name);
        ctx.defer_state(&bean, reader, trace);
        Ok(BeanValue::Bean(bean))
    }
}

impl ValueCodec for DefaultValueCodec {
    fn check(&self, value: &BeanValue) -> CodecResult<()> {
        match value {
            BeanValue::Opaque(name) => Err(CodecError::Unsupported(format!(
                "cannot serialize object of type `{name}`"
            ))),
            BeanValue::List(items) => items.iter().try_for_each(|item| self.check(item)),
            _ => Ok(()),
        }
    }

    fn write(&self, ctx: &mut WriteContext<'_>, value: &BeanValue) -> CodecResult<()> {
        match value {
            BeanValue::Null => ctx.write_byte(tag::NULL),
            BeanValue::Boolean(true) => ctx.write_byte(tag::TRUE),
            BeanValue::Boolean(false) => ctx.write_byte(tag::FALSE),
            BeanValue::Int(value) => {
                ctx.write_byte(tag::INT)?;
                ctx.write_int(*value)
            }
            BeanValue::Long(value) => {
                ctx.write_byte(tag::LONG)?;
                ctx.write_long(*value)
            }
            BeanValue::Double(value) => {
                ctx.write_byte(tag::DOUBLE)?;
                ctx.write_double(*value)
            }
            BeanValue::String(value) => {
                ctx.write_byte(tag::STRING)?;
                ctx.write_string(value)
            }
            BeanValue::List(items) => {
                ctx.write_byte(tag::LIST)?;
                ctx.write_small_int(items.len() as u32)?;
                for (index, item) in items.iter().enumerate() {
                    let trace = ctx.trace().element(index);
                    ctx.with_trace(trace, |ctx| ctx.write_value(item))?;
                }
                Ok(())
            }
            BeanValue::Enum(constant) => {
                ctx.write_byte(tag::ENUM)?;
                ctx.write_string(constant.enum_name)?;
                ctx.write_small_int(constant.ordinal)
            }
            BeanValue::Bean(bean) => self.write_bean(ctx, bean),
            BeanValue::Opaque(_) => self.check(value),
        }
    }

    fn read(&self, ctx: &mut ReadContext<'_>) -> CodecResult<BeanValue> {
        match ctx.read_byte()? {
            tag::NULL => Ok(BeanValue::Null),
            tag::TRUE => Ok(BeanValue::Boolean(true)),
            tag::FALSE => Ok(BeanValue::Boolean(false)),
            tag::INT => Ok(BeanValue::Int(ctx.read_int()?)),
            tag::LONG => Ok(BeanValue::Long(ctx.read_long()?)),
            tag::DOUBLE => Ok(BeanValue::Double(ctx.read_double()?)),
            tag::STRING => Ok(BeanValue::String(ctx.read_string()?)),
            tag::LIST => {
                let len = ctx.read_small_int()? as usize;
                let mut items = Vec::with_capacity(len.min(MAX_LIST_RESERVATION));
                for index in 0..len {
                    let trace = ctx.trace().element(index);
                    items.push(ctx.with_trace(trace, |ctx| ctx.read_value())?);
                }
                Ok(BeanValue::List(items))
            }
            tag::ENUM => {
                let name = ctx.read_string()?;
                let ordinal = ctx.read_small_int()?;
                ctx.registry()
                    .enum_type(&name)
                    .and_then(|ty| ty.constant(ordinal))
                    .map(BeanValue::Enum)
                    .ok_or_else(|| CodecError::Format(format!("unknown constant {ordinal} of enum `{name}`")))
            }
            tag::BEAN => self.read_bean(ctx),
            tag::BEAN_REF => {
                let id = ctx.read_small_int()?;
                ctx.bean_by_id(id)
                    .map(BeanValue::Bean)
                    .ok_or_else(|| CodecError::Format(format!("reference to unknown bean {id}")))
            }
            tag => Err(CodecError::UnexpectedTag { tag, context: "value" }),
        }
    }
}
