//! Lossless schema projection to the wire formats LLM providers expect
//! (spec §4.1, §6, §8).

use serde_json::{json, Map, Value};

use super::descriptor::{ParamSpec, ParamType, ToolDescriptor};

fn json_type(t: ParamType) -> &'static str {
    match t {
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Number => "number",
        ParamType::Boolean => "boolean",
        ParamType::Array => "array",
        ParamType::Object => "object",
    }
}

fn property_schema(p: &ParamSpec) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), json!(json_type(p.param_type)));
    obj.insert("description".into(), json!(p.description));
    if let Some(values) = &p.enum_values {
        obj.insert("enum".into(), json!(values));
    }
    if let Some(min) = p.minimum {
        obj.insert("minimum".into(), json!(min));
    }
    if let Some(max) = p.maximum {
        obj.insert("maximum".into(), json!(max));
    }
    if let Some(min_len) = p.min_length {
        obj.insert("minLength".into(), json!(min_len));
    }
    if let Some(max_len) = p.max_length {
        obj.insert("maxLength".into(), json!(max_len));
    }
    if let Some(default) = &p.default {
        obj.insert("default".into(), default.clone());
    }
    Value::Object(obj)
}

fn properties_and_required(descriptor: &ToolDescriptor) -> (Map<String, Value>, Vec<Value>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in &descriptor.parameters {
        properties.insert(p.name.clone(), property_schema(p));
        if p.required {
            required.push(json!(p.name));
        }
    }
    (properties, required)
}

/// Project to the OpenAI `function` tool-calling schema.
pub fn to_openai_schema(descriptor: &ToolDescriptor) -> Value {
    let (properties, required) = properties_and_required(descriptor);
    json!({
        "type": "function",
        "function": {
            "name": descriptor.name,
            "description": descriptor.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        }
    })
}

/// Project to the Anthropic `tool` schema.
pub fn to_anthropic_schema(descriptor: &ToolDescriptor) -> Value {
    let (properties, required) = properties_and_required(descriptor);
    json!({
        "name": descriptor.name,
        "description": descriptor.description,
        "input_schema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// A thin, provider-agnostic shape invokable by general-purpose agent
/// frameworks that just want name/description/parameters.
pub fn to_generic_schema(descriptor: &ToolDescriptor) -> Value {
    let (properties, required) = properties_and_required(descriptor);
    json!({
        "name": descriptor.name,
        "description": descriptor.description,
        "parameters": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::descriptor::ToolCategory;

    fn sample() -> ToolDescriptor {
        ToolDescriptor::new("echo", "echoes input", ToolCategory::Other).with_params(vec![
            ParamSpec::new("text", ParamType::String, "text to echo")
                .required()
                .with_length(Some(1), Some(100)),
            ParamSpec::new("mode", ParamType::String, "mode")
                .with_enum(vec![json!("a"), json!("b")]),
        ])
    }

    #[test]
    fn round_trips_through_json_without_loss() {
        let descriptor = sample();
        for projector in [to_openai_schema, to_anthropic_schema, to_generic_schema] {
            let value = projector(&descriptor);
            let round_tripped: Value = serde_json::from_str(&value.to_string()).unwrap();
            let props = if let Some(f) = round_tripped.get("function") {
                f.get("parameters").unwrap().get("properties").unwrap()
            } else {
                round_tripped
                    .get("input_schema")
                    .or_else(|| round_tripped.get("parameters"))
                    .unwrap()
                    .get("properties")
                    .unwrap()
            };
            assert!(props.get("text").unwrap().get("maxLength").is_some());
            assert!(props.get("mode").unwrap().get("enum").is_some());
        }
    }

    #[test]
    fn openai_schema_required_matches_descriptor() {
        let descriptor = sample();
        let schema = to_openai_schema(&descriptor);
        let required = schema["function"]["parameters"]["required"].as_array().unwrap();
        assert_eq!(required, &vec![json!("text")]);
    }
}
