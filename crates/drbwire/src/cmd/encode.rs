use drbwire_marshal::{encode_raw, encode_top_level, Value};

use crate::cmd::{parse_literal, EncodeArgs};
use crate::exit::{marshal_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let value = literal_value(&args.values)?;
    let bytes = if args.raw {
        encode_raw(&value)
    } else {
        encode_top_level(&value, !args.no_version)
    }
    .map_err(|err| marshal_error("encode failed", err))?;

    print_encoded(&value, &bytes, format);
    Ok(SUCCESS)
}

/// One literal encodes as itself; several become an array.
fn literal_value(literals: &[String]) -> CliResult<Value> {
    match literals {
        [single] => parse_literal(single),
        many => Ok(Value::Array(
            many.iter()
                .map(|literal| parse_literal(literal))
                .collect::<CliResult<Vec<_>>>()?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn several_literals_form_an_array() {
        let value = literal_value(&["1".to_string(), ":a".to_string()]).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Integer(1), Value::symbol("a")])
        );
        assert_eq!(literal_value(&["nil".to_string()]).unwrap(), Value::Nil);
    }
}
