//! JavaScript value conversion for snapshots and console output.
//!
//! Snapshot semantics follow what `JSON.stringify` would show a user:
//! function-valued and `undefined` entries disappear from objects, become
//! `null` inside arrays, and non-finite numbers render as `null`. Depth is
//! bounded so cyclic structures stay referenced instead of expanding.

use boa_engine::{js_string, Context, JsObject, JsResult, JsValue};
use serde_json::{Map, Number, Value};

/// Maximum nesting converted into a snapshot before truncating.
pub(crate) const MAX_SNAPSHOT_DEPTH: usize = 6;

/// Cap on converted array elements.
const MAX_ARRAY_ITEMS: u32 = 1_024;

/// Placeholder for structure beyond the depth bound.
const TRUNCATED: &str = "…";

/// Convert a JavaScript value to JSON for a locals snapshot.
///
/// Returns `None` for values that have no JSON representation
/// (`undefined`, functions, symbols); the caller decides whether that
/// means "skip the key" or "null element".
pub(crate) fn js_value_to_json(
    value: &JsValue,
    context: &mut Context,
    depth: usize,
) -> Option<Value> {
    convert(value, context, depth).unwrap_or_else(|_| Some(Value::String(TRUNCATED.to_string())))
}

fn convert(value: &JsValue, context: &mut Context, depth: usize) -> JsResult<Option<Value>> {
    if value.is_undefined() {
        return Ok(None);
    }
    if value.is_null() {
        return Ok(Some(Value::Null));
    }
    if let Some(b) = value.as_boolean() {
        return Ok(Some(Value::Bool(b)));
    }
    if let Some(n) = value.as_number() {
        return Ok(Some(number_to_json(n)));
    }
    if let Some(s) = value.as_string() {
        return Ok(Some(Value::String(s.to_std_string_escaped())));
    }
    if let Some(big) = value.as_bigint() {
        return Ok(Some(Value::String(big.to_string())));
    }
    let Some(object) = value.as_object() else {
        // symbols and anything else without a JSON shape
        return Ok(None);
    };
    let object = object.clone();
    if object.is_callable() {
        return Ok(None);
    }
    if depth == 0 {
        return Ok(Some(Value::String(TRUNCATED.to_string())));
    }
    if is_array(value, context)? {
        let length = object
            .get(js_string!("length"), context)?
            .to_u32(context)?
            .min(MAX_ARRAY_ITEMS);
        let mut items = Vec::with_capacity(length as usize);
        for i in 0..length {
            let element = object.get(i, context)?;
            items.push(convert(&element, context, depth - 1)?.unwrap_or(Value::Null));
        }
        return Ok(Some(Value::Array(items)));
    }
    let mut map = Map::new();
    for key in own_enumerable_keys(&object, context)? {
        let member = object.get(boa_engine::JsString::from(key.as_str()), context)?;
        if let Some(json) = convert(&member, context, depth - 1)? {
            map.insert(key, json);
        }
    }
    Ok(Some(Value::Object(map)))
}

fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    #[allow(clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Own enumerable string keys of an object, via the engine's
/// `Object.keys` so proxy and ordering semantics match the language.
pub(crate) fn own_enumerable_keys(
    object: &JsObject,
    context: &mut Context,
) -> JsResult<Vec<String>> {
    let object_ctor = context.intrinsics().constructors().object().constructor();
    let keys_fn = object_ctor.get(js_string!("keys"), context)?;
    let Some(keys_fn) = keys_fn.as_callable() else {
        return Ok(Vec::new());
    };
    let keys = keys_fn.call(
        &JsValue::undefined(),
        &[JsValue::from(object.clone())],
        context,
    )?;
    let Some(keys_obj) = keys.as_object() else {
        return Ok(Vec::new());
    };
    let keys_obj = keys_obj.clone();
    let length = keys_obj.get(js_string!("length"), context)?.to_u32(context)?;
    let mut out = Vec::with_capacity(length as usize);
    for i in 0..length {
        let key = keys_obj.get(i, context)?;
        if let Some(s) = key.as_string() {
            out.push(s.to_std_string_escaped());
        }
    }
    Ok(out)
}

fn is_array(value: &JsValue, context: &mut Context) -> JsResult<bool> {
    let array_ctor = context.intrinsics().constructors().array().constructor();
    let is_array_fn = array_ctor.get(js_string!("isArray"), context)?;
    let Some(is_array_fn) = is_array_fn.as_callable() else {
        return Ok(false);
    };
    Ok(is_array_fn
        .call(&JsValue::undefined(), &[value.clone()], context)?
        .to_boolean())
}

/// Render one `console.log` argument: object-like values as their JSON
/// serialization, everything else string-coerced.
pub(crate) fn format_console_arg(arg: &JsValue, context: &mut Context) -> JsResult<String> {
    if let Some(object) = arg.as_object() {
        if !object.is_callable() {
            if let Some(json) = js_value_to_json(arg, context, MAX_SNAPSHOT_DEPTH) {
                return Ok(serde_json::to_string(&json).unwrap_or_else(|_| json.to_string()));
            }
        }
    }
    Ok(arg.to_string(context)?.to_std_string_escaped())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn eval(context: &mut Context, src: &str) -> JsValue {
        context.eval(Source::from_bytes(src)).expect("eval failed")
    }

    #[test]
    fn scalars_convert_directly() {
        let mut ctx = Context::default();
        assert_eq!(
            js_value_to_json(&eval(&mut ctx, "42"), &mut ctx, 4),
            Some(Value::Number(42.into()))
        );
        assert_eq!(
            js_value_to_json(&eval(&mut ctx, "1.5"), &mut ctx, 4),
            Number::from_f64(1.5).map(Value::Number)
        );
        assert_eq!(
            js_value_to_json(&eval(&mut ctx, "'hi'"), &mut ctx, 4),
            Some(Value::String("hi".into()))
        );
        assert_eq!(
            js_value_to_json(&eval(&mut ctx, "null"), &mut ctx, 4),
            Some(Value::Null)
        );
        assert_eq!(js_value_to_json(&eval(&mut ctx, "undefined"), &mut ctx, 4), None);
    }

    #[test]
    fn arrays_and_objects_nest() {
        let mut ctx = Context::default();
        let value = eval(&mut ctx, "({a: [1, 2], b: {c: 'x'}})");
        let json = js_value_to_json(&value, &mut ctx, 4).unwrap();
        assert_eq!(json, serde_json::json!({"a": [1, 2], "b": {"c": "x"}}));
    }

    #[test]
    fn functions_vanish_from_objects_but_null_in_arrays() {
        let mut ctx = Context::default();
        let value = eval(&mut ctx, "({f: function () {}, n: 1})");
        let json = js_value_to_json(&value, &mut ctx, 4).unwrap();
        assert_eq!(json, serde_json::json!({"n": 1}));

        let value = eval(&mut ctx, "[function () {}, 2]");
        let json = js_value_to_json(&value, &mut ctx, 4).unwrap();
        assert_eq!(json, serde_json::json!([null, 2]));
    }

    #[test]
    fn cyclic_objects_truncate_instead_of_hanging() {
        let mut ctx = Context::default();
        let value = eval(&mut ctx, "(() => { const o = {}; o.me = o; return o; })()");
        let json = js_value_to_json(&value, &mut ctx, 3).unwrap();
        // the cycle bottoms out at the placeholder rather than recursing
        let rendered = json.to_string();
        assert!(rendered.contains(TRUNCATED));
    }

    #[test]
    fn non_finite_numbers_become_null() {
        let mut ctx = Context::default();
        assert_eq!(
            js_value_to_json(&eval(&mut ctx, "1/0"), &mut ctx, 4),
            Some(Value::Null)
        );
        assert_eq!(
            js_value_to_json(&eval(&mut ctx, "NaN"), &mut ctx, 4),
            Some(Value::Null)
        );
    }

    #[test]
    fn console_args_format_like_the_original() {
        let mut ctx = Context::default();
        let s = eval(&mut ctx, "'plain'");
        assert_eq!(format_console_arg(&s, &mut ctx).unwrap(), "plain");

        let n = eval(&mut ctx, "3");
        assert_eq!(format_console_arg(&n, &mut ctx).unwrap(), "3");

        let o = eval(&mut ctx, "({x: 1})");
        assert_eq!(format_console_arg(&o, &mut ctx).unwrap(), "{\"x\":1}");

        let a = eval(&mut ctx, "[1, 'two']");
        assert_eq!(format_console_arg(&a, &mut ctx).unwrap(), "[1,\"two\"]");
    }
}
