use glam::{Mat4, Vec3};
use log::warn;

use crate::error::Result;
use crate::renderer::gl;
use crate::renderer::textures::{Textures, DISPLACEMENT_SLOT, TEXTURE_SLOTS};

// Attribute locations match binder::ATTRIBUTE_SLOTS.
const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 TEXCOORD_0;
layout(location = 3) in vec4 TANGENT;
uniform mat4 MVP;
uniform bool use_displacement;
uniform sampler2D disp_tex;
out vec3 world_position;
out vec3 world_normal;
out vec4 world_tangent;
out vec2 uv;
void main() {
    vec3 position = POSITION;
    if (use_displacement) {
        position += NORMAL * texture(disp_tex, TEXCOORD_0).r * 0.05;
    }
    // The model matrix is the identity, so model space is world space.
    world_position = position;
    world_normal = NORMAL;
    world_tangent = TANGENT;
    uv = TEXCOORD_0;
    gl_Position = MVP * vec4(position, 1.0);
}
"#;
const FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
in vec3 world_position;
in vec3 world_normal;
in vec4 world_tangent;
in vec2 uv;
uniform vec3 lightpos;
uniform vec3 camerapos;
uniform sampler2D nor_tex;
uniform sampler2D diff_tex;
uniform sampler2D arm_tex;
out vec4 FRAG_COLOR;
void main() {
    vec3 normal = normalize(world_normal);
    if (dot(world_tangent.xyz, world_tangent.xyz) > 1e-6) {
        vec3 tangent = normalize(world_tangent.xyz);
        vec3 bitangent = cross(normal, tangent) * (world_tangent.w < 0.0 ? -1.0 : 1.0);
        vec3 tangent_normal = texture(nor_tex, uv).xyz * 2.0 - 1.0;
        normal = normalize(mat3(tangent, bitangent, normal) * tangent_normal);
    }
    vec3 arm = texture(arm_tex, uv).rgb;
    vec3 albedo = texture(diff_tex, uv).rgb;
    vec3 to_light = normalize(lightpos - world_position);
    vec3 to_camera = normalize(camerapos - world_position);
    vec3 halfway = normalize(to_light + to_camera);

    float shininess = mix(64.0, 4.0, arm.g);
    float diffuse = max(dot(normal, to_light), 0.0);
    float specular = pow(max(dot(normal, halfway), 0.0), shininess) * (1.0 - arm.g);
    vec3 specular_color = mix(vec3(0.04), albedo, arm.b);
    vec3 output_linear_color = albedo * (0.1 * arm.r + diffuse * (1.0 - arm.b))
        + specular_color * specular;

    // The framebuffer is not SRGB, so we transform the linear color to close-enough-to-srgb.
    FRAG_COLOR = vec4(pow(output_linear_color, vec3(1.0 / 2.2)), 1.0);
}
"#;

pub struct ShaderProgram {
    pub program: gl::types::GLuint,
    mvp_location: Option<gl::types::GLint>,
    light_pos_location: Option<gl::types::GLint>,
    camera_pos_location: Option<gl::types::GLint>,
}

impl ShaderProgram {
    /// Compiles the viewer's shader program, makes it current and points
    /// its samplers at their texture units.
    pub fn new(displacement: bool) -> Result<ShaderProgram> {
        let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, VERTEX_SHADER)?;
        let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, FRAGMENT_SHADER) {
            Ok(shader) => shader,
            Err(err) => {
                gl::call!(gl::DeleteShader(vertex_shader));
                return Err(err);
            }
        };
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!(gl::DeleteShader(vertex_shader));
        gl::call!(gl::DeleteShader(fragment_shader));
        let program = program?;
        gl::call!(gl::UseProgram(program));

        let uniform = |name: &str| {
            let location = gl::get_uniform_location(program, name);
            if location.is_none() {
                warn!("uniform {name} is not used by the shader program");
            }
            location
        };
        let shader_program = ShaderProgram {
            program,
            mvp_location: uniform("MVP"),
            light_pos_location: uniform("lightpos"),
            camera_pos_location: uniform("camerapos"),
        };

        let slots = Textures::slot_count(displacement);
        for (unit, name) in TEXTURE_SLOTS.iter().enumerate().take(slots) {
            if let Some(location) = gl::get_uniform_location(program, name) {
                gl::call!(gl::Uniform1i(location, unit as gl::types::GLint));
            }
        }
        if let Some(location) = gl::get_uniform_location(program, "use_displacement") {
            let enabled = slots > DISPLACEMENT_SLOT;
            gl::call!(gl::Uniform1i(location, enabled as gl::types::GLint));
        }

        Ok(shader_program)
    }

    pub fn set_frame_uniforms(&self, mvp: Mat4, light_pos: Vec3, camera_pos: Vec3) {
        gl::call!(gl::UseProgram(self.program));
        if let Some(location) = self.mvp_location {
            let mvp: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&mvp));
            gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, mvp.as_ptr()));
        }
        if let Some(location) = self.light_pos_location {
            gl::call!(gl::Uniform3fv(location, 1, light_pos.as_ref().as_ptr()));
        }
        if let Some(location) = self.camera_pos_location {
            gl::call!(gl::Uniform3fv(location, 1, camera_pos.as_ref().as_ptr()));
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        gl::call!(gl::DeleteProgram(self.program));
    }
}
