//! Script evaluator.
//!
//! Walks a parsed script body. Arrays whose first element names a known
//! operator are applications; other arrays evaluate element-wise, objects
//! evaluate value-wise, and scalars are literals. Operators may await, so
//! evaluation is a boxed recursive future.

use futures_util::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

use super::ScriptContext;
use crate::shared::error::{EngineError, EngineResult};

type Op = for<'a> fn(&'a [Value], &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>>;

fn operators() -> &'static HashMap<&'static str, Op> {
    static OPS: OnceLock<HashMap<&'static str, Op>> = OnceLock::new();
    OPS.get_or_init(|| {
        let mut ops: HashMap<&'static str, Op> = HashMap::new();
        ops.insert("var", op_var as Op);
        ops.insert("store.get", op_store_get as Op);
        ops.insert("store.merge", op_store_merge as Op);
        ops.insert("+", op_add as Op);
        ops.insert("-", op_sub as Op);
        ops.insert("*", op_mul as Op);
        ops.insert("/", op_div as Op);
        ops.insert("%", op_mod as Op);
        ops.insert("==", op_eq as Op);
        ops.insert("!=", op_neq as Op);
        ops.insert(">", op_gt as Op);
        ops.insert("<", op_lt as Op);
        ops.insert(">=", op_gte as Op);
        ops.insert("<=", op_lte as Op);
        ops.insert("&&", op_and as Op);
        ops.insert("||", op_or as Op);
        ops.insert("!", op_not as Op);
        ops.insert("if", op_if as Op);
        ops.insert("do", op_do as Op);
        ops.insert("concat", op_concat as Op);
        ops.insert("template", op_template as Op);
        ops.insert("get", op_get as Op);
        ops.insert("len", op_len as Op);
        ops.insert("log", op_log as Op);
        ops.insert("navigate", op_navigate as Op);
        ops.insert("notify", op_notify as Op);
        ops.insert("http.get", op_http_get as Op);
        ops.insert("http.post", op_http_post as Op);
        ops.insert("delay", op_delay as Op);
        ops
    })
}

/// Evaluate a script node against a context.
pub fn evaluate<'a>(node: &'a Value, ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        match node {
            Value::Array(arr) => {
                if arr.is_empty() {
                    return Ok(Value::Array(vec![]));
                }
                if let Some(op_name) = arr.first().and_then(|v| v.as_str()) {
                    if let Some(op) = operators().get(op_name) {
                        return op(&arr[1..], ctx).await;
                    }
                }
                let mut out = Vec::with_capacity(arr.len());
                for item in arr {
                    out.push(evaluate(item, ctx).await?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(obj) => {
                let mut out = Map::new();
                for (key, value) in obj {
                    out.insert(key.clone(), evaluate(value, ctx).await?);
                }
                Ok(Value::Object(out))
            }
            _ => Ok(node.clone()),
        }
    })
}

fn require_arg<'a>(args: &'a [Value], index: usize, op: &str) -> EngineResult<&'a Value> {
    args.get(index)
        .ok_or_else(|| EngineError::script(format!("{} requires argument {}", op, index)))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Bool(b) => Some(if *b { 1 } else { 0 }),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Follow a dotted path into a map, descending objects and arrays.
fn map_get(map: &Map<String, Value>, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(Value::Object(map.clone()));
    }
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = map.get(first)?;
    for part in parts {
        match current {
            Value::Object(obj) => current = obj.get(part)?,
            Value::Array(arr) => {
                let idx = part.parse::<usize>().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current.clone())
}

fn cmp_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(a.to_string().cmp(&b.to_string())),
    }
}

fn op_var<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let raw = evaluate(require_arg(args, 0, "var")?, ctx).await?;
        let Some(path) = raw.as_str() else {
            return Ok(Value::Null);
        };
        Ok(map_get(&ctx.bindings, path).unwrap_or(Value::Null))
    })
}

fn op_store_get<'a>(
    args: &'a [Value],
    ctx: &'a ScriptContext,
) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let raw = evaluate(require_arg(args, 0, "store.get")?, ctx).await?;
        let Some(path) = raw.as_str() else {
            return Ok(Value::Null);
        };
        let store = ctx.store.read().await;
        Ok(map_get(&store, path).unwrap_or(Value::Null))
    })
}

fn op_store_merge<'a>(
    args: &'a [Value],
    ctx: &'a ScriptContext,
) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let patch = evaluate(require_arg(args, 0, "store.merge")?, ctx).await?;
        let Value::Object(patch) = patch else {
            return Err(EngineError::script("store.merge requires an object"));
        };
        let mut store = ctx.store.write().await;
        // Shallow merge, last write wins.
        for (key, value) in patch.iter() {
            store.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(patch))
    })
}

fn op_add<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let mut total = 0.0;
        for arg in args {
            let v = evaluate(arg, ctx).await?;
            total += as_f64(&v).unwrap_or(0.0);
        }
        Ok(json!(total))
    })
}

fn op_sub<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "-")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "-")?, ctx).await?;
        Ok(json!(as_f64(&a).unwrap_or(0.0) - as_f64(&b).unwrap_or(0.0)))
    })
}

fn op_mul<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let mut product = 1.0;
        for arg in args {
            let v = evaluate(arg, ctx).await?;
            product *= as_f64(&v).unwrap_or(0.0);
        }
        Ok(json!(product))
    })
}

fn op_div<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "/")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "/")?, ctx).await?;
        let denom = as_f64(&b).unwrap_or(0.0);
        if denom == 0.0 {
            return Err(EngineError::script("division by zero"));
        }
        Ok(json!(as_f64(&a).unwrap_or(0.0) / denom))
    })
}

fn op_mod<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "%")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "%")?, ctx).await?;
        let denom = as_i64(&b).unwrap_or(0);
        if denom == 0 {
            return Err(EngineError::script("modulo by zero"));
        }
        Ok(json!(as_i64(&a).unwrap_or(0) % denom))
    })
}

fn op_eq<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "==")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "==")?, ctx).await?;
        Ok(Value::Bool(a == b))
    })
}

fn op_neq<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "!=")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "!=")?, ctx).await?;
        Ok(Value::Bool(a != b))
    })
}

fn op_gt<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, ">")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, ">")?, ctx).await?;
        Ok(Value::Bool(cmp_values(&a, &b).is_some_and(|o| o.is_gt())))
    })
}

fn op_lt<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "<")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "<")?, ctx).await?;
        Ok(Value::Bool(cmp_values(&a, &b).is_some_and(|o| o.is_lt())))
    })
}

fn op_gte<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, ">=")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, ">=")?, ctx).await?;
        Ok(Value::Bool(cmp_values(&a, &b).is_some_and(|o| !o.is_lt())))
    })
}

fn op_lte<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let a = evaluate(require_arg(args, 0, "<=")?, ctx).await?;
        let b = evaluate(require_arg(args, 1, "<=")?, ctx).await?;
        Ok(Value::Bool(cmp_values(&a, &b).is_some_and(|o| !o.is_gt())))
    })
}

fn op_and<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let mut last = Value::Bool(true);
        for arg in args {
            last = evaluate(arg, ctx).await?;
            if !truthy(&last) {
                return Ok(Value::Bool(false));
            }
        }
        Ok(last)
    })
}

fn op_or<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        for arg in args {
            let v = evaluate(arg, ctx).await?;
            if truthy(&v) {
                return Ok(v);
            }
        }
        Ok(Value::Bool(false))
    })
}

fn op_not<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let v = evaluate(require_arg(args, 0, "!")?, ctx).await?;
        Ok(Value::Bool(!truthy(&v)))
    })
}

fn op_if<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let cond = evaluate(require_arg(args, 0, "if")?, ctx).await?;
        if truthy(&cond) {
            match args.get(1) {
                Some(t) => evaluate(t, ctx).await,
                None => Ok(Value::Null),
            }
        } else {
            match args.get(2) {
                Some(f) => evaluate(f, ctx).await,
                None => Ok(Value::Null),
            }
        }
    })
}

fn op_do<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let mut last = Value::Null;
        for arg in args {
            last = evaluate(arg, ctx).await?;
        }
        Ok(last)
    })
}

fn op_concat<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let mut out = String::new();
        for arg in args {
            let v = evaluate(arg, ctx).await?;
            out.push_str(&to_display(&v));
        }
        Ok(Value::String(out))
    })
}

fn op_template<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let fmt = evaluate(require_arg(args, 0, "template")?, ctx).await?;
        let mut out = to_display(&fmt);
        for arg in &args[1..] {
            let v = evaluate(arg, ctx).await?;
            if out.contains("{}") {
                out = out.replacen("{}", &to_display(&v), 1);
            }
        }
        Ok(Value::String(out))
    })
}

fn op_get<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let collection = evaluate(require_arg(args, 0, "get")?, ctx).await?;
        let key = evaluate(require_arg(args, 1, "get")?, ctx).await?;
        let out = match (collection, key) {
            (Value::Object(obj), Value::String(k)) => obj.get(&k).cloned(),
            (Value::Array(arr), Value::Number(n)) => {
                n.as_u64().and_then(|i| arr.get(i as usize).cloned())
            }
            (Value::Array(arr), Value::String(s)) => {
                s.parse::<usize>().ok().and_then(|i| arr.get(i).cloned())
            }
            _ => None,
        };
        Ok(out.unwrap_or(Value::Null))
    })
}

fn op_len<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let v = evaluate(require_arg(args, 0, "len")?, ctx).await?;
        let n = match v {
            Value::String(s) => s.chars().count(),
            Value::Array(a) => a.len(),
            Value::Object(o) => o.len(),
            _ => 0,
        };
        Ok(json!(n))
    })
}

fn op_log<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(evaluate(arg, ctx).await?);
        }
        tracing::debug!(target: "pagewright::script", "{}", serde_json::Value::Array(out.clone()));
        Ok(Value::Array(out))
    })
}

fn op_navigate<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let target = evaluate(require_arg(args, 0, "navigate")?, ctx).await?;
        let Some(path) = target.as_str() else {
            return Err(EngineError::script("navigate path must be a string"));
        };
        ctx.host.navigate(path)?;
        Ok(Value::Null)
    })
}

fn op_notify<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let (level, message) = if args.len() >= 2 {
            let level = evaluate(&args[0], ctx).await?;
            let message = evaluate(&args[1], ctx).await?;
            (to_display(&level), to_display(&message))
        } else {
            let message = evaluate(require_arg(args, 0, "notify")?, ctx).await?;
            ("info".to_string(), to_display(&message))
        };
        ctx.host.notify(&level, &message);
        Ok(Value::Null)
    })
}

fn op_http_get<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let url = evaluate(require_arg(args, 0, "http.get")?, ctx).await?;
        let Some(url) = url.as_str() else {
            return Err(EngineError::script("http.get url must be a string"));
        };
        ctx.host.http("GET".into(), url.to_string(), None).await
    })
}

fn op_http_post<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let url = evaluate(require_arg(args, 0, "http.post")?, ctx).await?;
        let Some(url) = url.as_str() else {
            return Err(EngineError::script("http.post url must be a string"));
        };
        let body = match args.get(1) {
            Some(node) => Some(evaluate(node, ctx).await?),
            None => None,
        };
        ctx.host.http("POST".into(), url.to_string(), body).await
    })
}

fn op_delay<'a>(args: &'a [Value], ctx: &'a ScriptContext) -> BoxFuture<'a, EngineResult<Value>> {
    Box::pin(async move {
        let ms = evaluate(require_arg(args, 0, "delay")?, ctx).await?;
        let ms = as_i64(&ms).unwrap_or(0).max(0) as u64;
        ctx.host.delay(ms).await;
        Ok(Value::Null)
    })
}
