use std::error::Error;

use chrono::{NaiveDateTime, TimeZone, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType, to_sql_checked};
use tokio_util::bytes;

use crate::types::RowValues;

/// Borrow the bindings as the parameter list `tokio-postgres` expects.
pub(crate) fn as_params(
    bindings: &[RowValues],
) -> impl ExactSizeIterator<Item = &(dyn ToSql + Sync)> {
    bindings.iter().map(|p| p as &(dyn ToSql + Sync))
}

impl ToSql for RowValues {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            // the server picks the column width; convert to it
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                _ => encode(i, ty, out),
            },
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => encode(f, ty, out),
            },
            RowValues::Text(s) => encode(s, ty, out),
            RowValues::Bool(b) => encode(b, ty, out),
            RowValues::Timestamp(dt) => timestamp_to_sql(dt, ty, out),
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => encode(jsval, ty, out),
            RowValues::Blob(bytes) => encode(bytes, ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

/// Write `value` only if its native encoding matches the parameter type.
///
/// `accepts` is checked per Rust type, not per value, so a `Bool` bound to a `TEXT`
/// parameter reaches here and must be refused rather than sent as raw bytes.
fn encode<T: ToSql>(
    value: &T,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    if T::accepts(ty) {
        value.to_sql(ty, out)
    } else {
        Err(Box::new(WrongType::new::<T>(ty.clone())))
    }
}

fn timestamp_to_sql(
    dt: &NaiveDateTime,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::TIMESTAMPTZ => Utc.from_utc_datetime(dt).to_sql(ty, out),
        Type::DATE => dt.date().to_sql(ty, out),
        _ => encode(dt, ty, out),
    }
}
