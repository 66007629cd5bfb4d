//! ComfyUI workflow graph construction.
//!
//! A workflow is a JSON object keyed by node id. Inputs that come from
//! another node are `[node_id, output_index]` pairs.

use cud_domain::SelectedAdapter;
use serde_json::{Map, Value, json};

const CHECKPOINT_NODE: &str = "1";
const POSITIVE_NODE: &str = "2";
const NEGATIVE_NODE: &str = "3";
const LATENT_NODE: &str = "4";
const SAMPLER_NODE: &str = "5";
const DECODE_NODE: &str = "6";
/// Node whose outputs carry the finished images
pub const SAVE_NODE: &str = "7";
/// Adapter nodes are numbered from here, in application order
const FIRST_ADAPTER_NODE: usize = 10;

/// Everything a workflow needs apart from the adapters
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowParams {
    pub checkpoint: String,
    pub prompt: String,
    pub negative: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f32,
    pub sampler_name: String,
    pub scheduler: String,
    pub seed: u64,
}

/// `(model strength, clip strength)` for one adapter.
///
/// `strength` defaults to 1.0, `clip_strength` to `strength`, and
/// `weight` scales both.
pub fn adapter_strengths(adapter: &SelectedAdapter) -> (f32, f32) {
    let options = adapter.options;
    let weight = options.weight.unwrap_or(1.0);
    let model = options.strength.unwrap_or(1.0);
    let clip = options.clip_strength.unwrap_or(model);
    (model * weight, clip * weight)
}

/// Join a negative prompt with the configured suffix, skipping blanks.
pub fn negative_prompt(negative: Option<&str>, suffix: &str) -> String {
    [negative.unwrap_or(""), suffix]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the text-to-image graph, chaining one `LoraLoader` per adapter
/// between the checkpoint and its consumers.
pub fn build_workflow(params: &WorkflowParams, adapters: &[&SelectedAdapter]) -> Value {
    let mut nodes = Map::new();
    nodes.insert(
        CHECKPOINT_NODE.to_string(),
        json!({
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": params.checkpoint },
        }),
    );

    let mut model = json!([CHECKPOINT_NODE, 0]);
    let mut clip = json!([CHECKPOINT_NODE, 1]);
    for (index, adapter) in adapters.iter().enumerate() {
        let id = (FIRST_ADAPTER_NODE + index).to_string();
        let (strength_model, strength_clip) = adapter_strengths(adapter);
        nodes.insert(
            id.clone(),
            json!({
                "class_type": "LoraLoader",
                "inputs": {
                    "lora_name": adapter.id.as_str(),
                    "strength_model": strength_model,
                    "strength_clip": strength_clip,
                    "model": model,
                    "clip": clip,
                },
            }),
        );
        model = json!([id, 0]);
        clip = json!([id, 1]);
    }

    nodes.insert(
        POSITIVE_NODE.to_string(),
        json!({
            "class_type": "CLIPTextEncode",
            "inputs": { "text": params.prompt, "clip": clip },
        }),
    );
    nodes.insert(
        NEGATIVE_NODE.to_string(),
        json!({
            "class_type": "CLIPTextEncode",
            "inputs": { "text": params.negative, "clip": clip },
        }),
    );
    nodes.insert(
        LATENT_NODE.to_string(),
        json!({
            "class_type": "EmptyLatentImage",
            "inputs": { "width": params.width, "height": params.height, "batch_size": 1 },
        }),
    );
    nodes.insert(
        SAMPLER_NODE.to_string(),
        json!({
            "class_type": "KSampler",
            "inputs": {
                "seed": params.seed,
                "steps": params.steps,
                "cfg": params.cfg,
                "sampler_name": params.sampler_name,
                "scheduler": params.scheduler,
                "denoise": 1.0,
                "model": model,
                "positive": [POSITIVE_NODE, 0],
                "negative": [NEGATIVE_NODE, 0],
                "latent_image": [LATENT_NODE, 0],
            },
        }),
    );
    nodes.insert(
        DECODE_NODE.to_string(),
        json!({
            "class_type": "VAEDecode",
            "inputs": { "samples": [SAMPLER_NODE, 0], "vae": [CHECKPOINT_NODE, 2] },
        }),
    );
    nodes.insert(
        SAVE_NODE.to_string(),
        json!({
            "class_type": "SaveImage",
            "inputs": { "filename_prefix": "cud-chat", "images": [DECODE_NODE, 0] },
        }),
    );

    Value::Object(nodes)
}
