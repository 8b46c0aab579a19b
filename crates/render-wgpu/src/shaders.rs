/// Vertex program for lit layers: position + normal, directional shading.
pub const LIT_VERTEX_SHADER: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) shade: f32,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = uniforms.model * vec4<f32>(vertex.position, 1.0);
    let n = (uniforms.model * vec4<f32>(vertex.normal, 0.0)).xyz;
    let len = length(n);
    let world_normal = select(vec3<f32>(0.0, 0.0, 1.0), n / len, len > 0.0);

    let light_dir = normalize(vec3<f32>(0.3, 0.5, 1.0));
    let ambient = 0.35;
    let diffuse = max(dot(world_normal, light_dir), 0.0);

    var out: VertexOutput;
    out.clip_position = uniforms.projection * uniforms.view * world_pos;
    out.shade = ambient + diffuse * 0.65;
    return out;
}
"#;

/// Vertex program for flat layers: position only, unshaded.
pub const FLAT_VERTEX_SHADER: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) shade: f32,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.projection * uniforms.view * uniforms.model * vec4<f32>(position, 1.0);
    out.shade = 1.0;
    return out;
}
"#;

/// Fragment program shared by both layer kinds: uniform color times shade.
pub const FRAGMENT_SHADER: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@fragment
fn fs_main(@location(0) shade: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(uniforms.color.rgb * shade, uniforms.color.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga;

    fn validate(source: &str) -> Result<(), String> {
        let module =
            naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map(|_| ())
        .map_err(|e| e.to_string())
    }

    #[test]
    fn builtin_sources_validate() {
        for (name, source) in [
            ("lit vertex", LIT_VERTEX_SHADER),
            ("flat vertex", FLAT_VERTEX_SHADER),
            ("fragment", FRAGMENT_SHADER),
        ] {
            if let Err(e) = validate(source) {
                panic!("{name} shader is invalid: {e}");
            }
        }
    }

    #[test]
    fn malformed_source_is_rejected() {
        let unclosed = format!("{FLAT_VERTEX_SHADER}\nfn extra(x: f32 -> f32 {{");
        assert!(validate(&unclosed).is_err());
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let broken = FRAGMENT_SHADER.replace("uniforms.color.rgb", "missing_color.rgb");
        assert!(validate(&broken).is_err());
    }
}
