mod common;

use common::{bitmap, blit, caps_with_units, renderer, renderer_with};
use lumen_render::device::{
    Capabilities, DeviceCall, ParamLocation, ProgramId, RecordingDevice, UniformValue,
};
use lumen_render::coords::Transform2D;
use lumen_render::paint::{BlendMode, Rgba, Smoothing};
use lumen_render::render::{BitmapId, RenderTarget, ShaderDesc, ShaderId, ShaderState};
use lumen_render::{RenderError, Renderer, RendererConfig, Target};

const FRAGMENT: &str = "fn fs_main(in: VertexOut) -> @location(0) vec4<f32> { return in.color; }";

fn shader(r: &mut Renderer<RecordingDevice>, uses_custom_params: bool) -> ShaderId {
    r.create_shader(&ShaderDesc {
        code: FRAGMENT.to_string(),
        uses_custom_params,
    })
    .expect("create_shader")
}

fn last_program(r: &Renderer<RecordingDevice>) -> ProgramId {
    r.device()
        .calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            DeviceCall::CreateProgram(p) => Some(*p),
            _ => None,
        })
        .expect("a compiled program")
}

fn programs_used(r: &Renderer<RecordingDevice>) -> Vec<Option<ProgramId>> {
    r.device()
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::UseProgram(p) => Some(*p),
            _ => None,
        })
        .collect()
}

// ── compilation ───────────────────────────────────────────────────────────

#[test]
fn compile_failure_registers_nothing() {
    let mut r = renderer();
    r.device_mut().fail_next_compile("0:1: syntax error");
    let err = r
        .create_shader(&ShaderDesc {
            code: FRAGMENT.to_string(),
            uses_custom_params: false,
        })
        .unwrap_err();
    assert_eq!(err, RenderError::CompileFailure("0:1: syntax error".into()));
    assert_eq!(r.device().count(|c| matches!(c, DeviceCall::CreateProgram(_))), 0);

    let s = shader(&mut r, false);
    assert_eq!(r.shader_state(s), ShaderState::Inactive);
}

#[test]
fn shaders_need_device_support() {
    let mut r = renderer_with(Capabilities::minimal(), RendererConfig::default());
    let err = r
        .create_shader(&ShaderDesc {
            code: FRAGMENT.to_string(),
            uses_custom_params: false,
        })
        .unwrap_err();
    assert!(matches!(err, RenderError::Unsupported(_)));
}

// ── activation ────────────────────────────────────────────────────────────

#[test]
fn stop_with_pending_geometry_defers_until_flush() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, false);
    let program = last_program(&r);

    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);
    r.stop_shader(s).unwrap();
    assert_eq!(r.shader_state(s), ShaderState::PendingRemoval);
    assert_eq!(r.active_shaders(), &[s]);
    assert_eq!(r.device().draw_count(), 0);

    // A second stop while pending changes nothing.
    r.stop_shader(s).unwrap();
    assert_eq!(r.active_shaders(), &[s]);

    r.flush().unwrap();
    assert_eq!(r.shader_state(s), ShaderState::Inactive);
    assert!(r.active_shaders().is_empty());
    assert_eq!(programs_used(&r), vec![Some(program)]);

    r.flush().unwrap();
    assert_eq!(r.stats().flushes, 1);

    blit(&mut r, a, 0.0);
    r.flush().unwrap();
    assert_eq!(programs_used(&r), vec![Some(program), None]);
}

#[test]
fn stop_with_empty_batch_deactivates_at_once() {
    let mut r = renderer();
    let s = shader(&mut r, false);
    r.start_shader(s).unwrap();
    r.stop_shader(s).unwrap();
    assert_eq!(r.shader_state(s), ShaderState::Inactive);
    assert!(r.active_shaders().is_empty());
}

#[test]
fn stopping_a_custom_param_shader_flushes() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);

    r.stop_shader(s).unwrap();
    assert_eq!(r.device().draw_count(), 1);
    assert_eq!(r.shader_state(s), ShaderState::Inactive);
}

#[test]
fn starting_a_plain_shader_flushes_queued_geometry() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, false);
    blit(&mut r, a, 0.0);

    r.start_shader(s).unwrap();
    assert_eq!(r.device().draw_count(), 1);
    assert_eq!(programs_used(&r), vec![None]);
}

#[test]
fn starting_a_custom_param_shader_keeps_queued_geometry() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    blit(&mut r, a, 0.0);

    r.start_shader(s).unwrap();
    assert_eq!(r.device().draw_count(), 0);
    assert_eq!(r.batch().vertex_count(), 4);
}

#[test]
fn restarting_a_pending_shader_retires_the_old_activation() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, false);
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);
    r.stop_shader(s).unwrap();

    r.start_shader(s).unwrap();
    assert_eq!(r.device().draw_count(), 1);
    assert_eq!(r.shader_state(s), ShaderState::Active);
    assert_eq!(r.active_shaders(), &[s]);
}

#[test]
#[should_panic(expected = "started twice")]
fn starting_twice_is_a_contract_violation() {
    let mut r = renderer();
    let s = shader(&mut r, false);
    r.start_shader(s).unwrap();
    r.start_shader(s).unwrap();
}

#[test]
#[should_panic(expected = "stopped while inactive")]
fn stopping_an_inactive_shader_is_a_contract_violation() {
    let mut r = renderer();
    let s = shader(&mut r, false);
    r.stop_shader(s).unwrap();
}

#[test]
fn every_active_shader_draws_the_batch_once() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let first = shader(&mut r, true);
    let p1 = last_program(&r);
    let second = shader(&mut r, true);
    let p2 = last_program(&r);

    r.start_shader(first).unwrap();
    r.start_shader(second).unwrap();
    blit(&mut r, a, 0.0);
    r.flush().unwrap();

    assert_eq!(r.device().count(|c| matches!(c, DeviceCall::UploadGeometry { .. })), 1);
    assert_eq!(r.device().draw_count(), 2);
    assert_eq!(programs_used(&r), vec![Some(p1), Some(p2)]);
    assert_eq!(r.stats().flushes, 1);
    assert_eq!(r.stats().draws, 2);
}

#[test]
fn discarding_device_state_deactivates_everything() {
    let mut r = renderer();
    let s = shader(&mut r, false);
    r.start_shader(s).unwrap();
    r.discard_device_state();
    assert_eq!(r.shader_state(s), ShaderState::Inactive);
    assert!(r.active_shaders().is_empty());
}

#[test]
fn deleting_an_active_shader_submits_its_geometry() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, false);
    let program = last_program(&r);
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);

    r.delete_shader(s).unwrap();
    assert_eq!(r.device().draw_count(), 1);
    assert!(r.active_shaders().is_empty());
    assert_eq!(r.device().calls().last(), Some(&DeviceCall::DeleteProgram(program)));
    assert_eq!(r.state().program.get(), None, "deleted program is no longer cached");
}

// ── parameters ────────────────────────────────────────────────────────────

#[test]
fn parameters_reach_the_device_at_submission() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let strength = r.param_id(s, "strength").unwrap();
    let tint = r.param_id(s, "tint").unwrap();

    r.set_shader_float(s, strength, 0.5).unwrap();
    r.set_shader_vec3(s, tint, [1.0, 0.5, 0.25]).unwrap();
    r.set_shader_float(s, strength, 0.75).unwrap();
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);
    assert_eq!(r.device().count(|c| matches!(c, DeviceCall::SetUniform { .. })), 0);

    r.flush().unwrap();
    let calls = r.device().calls();
    let draw = calls.iter().position(|c| matches!(c, DeviceCall::DrawIndexed(_))).unwrap();
    let set = |value: UniformValue| {
        calls
            .iter()
            .position(|c| *c == DeviceCall::SetUniform { location: strength, value })
    };
    assert!(set(UniformValue::Float(0.75)).is_some_and(|i| i < draw));
    assert!(set(UniformValue::Float(0.5)).is_none());
    assert!(calls.contains(&DeviceCall::SetUniform {
        location: tint,
        value: UniformValue::Vec3([1.0, 0.5, 0.25]),
    }));
}

#[test]
fn changing_a_contributing_shader_parameter_flushes() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let strength = r.param_id(s, "strength").unwrap();
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);

    r.set_shader_float(s, strength, 2.0).unwrap();
    assert_eq!(r.device().draw_count(), 1);
    assert!(r.batch().is_empty());
}

#[test]
fn changing_an_inactive_shader_parameter_does_not_flush() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let strength = r.param_id(s, "strength").unwrap();
    blit(&mut r, a, 0.0);

    r.set_shader_float(s, strength, 2.0).unwrap();
    assert_eq!(r.device().draw_count(), 0);
}

// ── texture parameters ────────────────────────────────────────────────────

#[test]
fn texture_parameter_is_bound_with_its_clip_rect() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let mask = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let param = r.texture_param_id(s, "mask").unwrap();
    assert_eq!(r.texture_param_id(s, "mask").unwrap(), param);

    r.set_shader_texture(s, param, Some(mask)).unwrap();
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);
    r.device_mut().clear_calls();
    r.flush().unwrap();

    let mask_texture = r.bitmap(mask).unwrap().texture;
    let unit = r.texture_units().unit_of(mask_texture).unwrap();
    assert_eq!(unit, 1, "source texture takes the first unit");

    let sampler = r.param_id(s, "mask").unwrap();
    let top = r.param_id(s, "mask_top").unwrap();
    let right = r.param_id(s, "mask_right").unwrap();
    let calls = r.device().calls();
    assert!(calls.contains(&DeviceCall::SetUniform {
        location: sampler,
        value: UniformValue::Unit(unit),
    }));

    let float_at = |location: ParamLocation| {
        calls.iter().find_map(|c| match c {
            DeviceCall::SetUniform { location: l, value: UniformValue::Float(v) } if *l == location => {
                Some(*v)
            }
            _ => None,
        })
    };
    assert!((float_at(top).unwrap() - 0.1 / 8.0).abs() < 1e-6);
    assert!((float_at(right).unwrap() - 7.9 / 8.0).abs() < 1e-6);
}

#[test]
fn texture_parameters_are_bounded_by_unit_count() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let s = shader(&mut r, true);
    r.texture_param_id(s, "mask").unwrap();
    let err = r.texture_param_id(s, "noise").unwrap_err();
    assert!(matches!(err, RenderError::ResourceExhausted(_)));
}

#[test]
fn draw_sampling_more_textures_than_units_is_dropped() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let a = bitmap(&mut r, 8, 8);
    let mask = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let param = r.texture_param_id(s, "mask").unwrap();
    r.set_shader_texture(s, param, Some(mask)).unwrap();
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);

    let err = r.flush().unwrap_err();
    assert!(matches!(err, RenderError::ResourceExhausted(_)));
    assert!(r.batch().is_empty());
    assert_eq!(r.device().draw_count(), 0);
    assert_eq!(r.stats().flushes, 1);
}

/// Starts a custom shader sampling a mask beside the returned source bitmap.
/// On a one-unit device, drawing that source under it cannot be submitted.
fn masked(r: &mut Renderer<RecordingDevice>) -> (ShaderId, BitmapId) {
    let source = bitmap(r, 8, 8);
    let mask = bitmap(r, 8, 8);
    let s = shader(r, true);
    let param = r.texture_param_id(s, "mask").unwrap();
    r.set_shader_texture(s, param, Some(mask)).unwrap();
    r.start_shader(s).unwrap();
    (s, source)
}

#[test]
fn target_change_applies_when_its_flush_fails() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let canvas = bitmap(&mut r, 16, 16);
    let (_, source) = masked(&mut r);
    blit(&mut r, source, 0.0);

    let err = r.set_targets(&[Target::Bitmap(canvas)]).unwrap_err();
    assert!(matches!(err, RenderError::ResourceExhausted(_)));
    assert!(r.batch().is_empty());

    let canvas_texture = r.bitmap(canvas).unwrap().texture;
    assert_eq!(r.bound_targets(), &[RenderTarget::offscreen(canvas_texture, 16, 16)]);
}

#[test]
fn stopping_a_custom_shader_applies_when_its_flush_fails() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let (s, source) = masked(&mut r);
    blit(&mut r, source, 0.0);

    assert!(matches!(r.stop_shader(s), Err(RenderError::ResourceExhausted(_))));
    assert_eq!(r.shader_state(s), ShaderState::Inactive);
    assert!(r.active_shaders().is_empty());
}

#[test]
fn blend_change_applies_when_its_flush_fails() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let (_, source) = masked(&mut r);
    blit(&mut r, source, 0.0);

    assert!(r.set_blend_mode(BlendMode::Add).is_err());
    assert_eq!(r.state().blend.get(), Some(BlendMode::Add));
    assert_eq!(r.device().calls().last(), Some(&DeviceCall::SetBlend(BlendMode::Add)));
}

#[test]
fn draw_is_queued_when_the_flush_it_forces_fails() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let (_, source) = masked(&mut r);
    blit(&mut r, source, 0.0);

    let err = r
        .draw_bitmap(
            source,
            &Transform2D::default(),
            Rgba::WHITE,
            Smoothing::Default,
            BlendMode::Add,
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::ResourceExhausted(_)));
    assert_eq!(r.batch().vertex_count(), 4);
}

#[test]
fn failed_pass_does_not_skip_later_passes() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let (masking, source) = masked(&mut r);
    let plain = shader(&mut r, false);
    let plain_program = last_program(&r);
    r.start_shader(plain).unwrap();
    assert_eq!(r.active_shaders(), &[masking, plain]);
    blit(&mut r, source, 0.0);
    r.device_mut().clear_calls();

    assert!(r.flush().is_err());
    assert_eq!(r.device().draw_count(), 1);
    assert_eq!(programs_used(&r), vec![Some(plain_program)]);
}

#[test]
fn sharing_the_source_texture_costs_no_extra_unit() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let a = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let param = r.texture_param_id(s, "mask").unwrap();
    r.set_shader_texture(s, param, Some(a)).unwrap();
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);

    r.flush().unwrap();
    assert_eq!(r.device().draw_count(), 1);
}

#[test]
fn deleting_a_bitmap_clears_shader_references() {
    let mut r = renderer_with(caps_with_units(1), RendererConfig::default());
    let a = bitmap(&mut r, 8, 8);
    let mask = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let param = r.texture_param_id(s, "mask").unwrap();
    r.set_shader_texture(s, param, Some(mask)).unwrap();
    r.start_shader(s).unwrap();

    r.delete_bitmap(mask).unwrap();
    blit(&mut r, a, 0.0);
    r.flush().unwrap();
    assert_eq!(r.device().draw_count(), 1, "only the source texture is sampled now");
}

#[test]
fn deleting_a_bitmap_sampled_through_a_shader_flushes_first() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    let mask = bitmap(&mut r, 8, 8);
    let s = shader(&mut r, true);
    let param = r.texture_param_id(s, "mask").unwrap();
    r.set_shader_texture(s, param, Some(mask)).unwrap();
    r.start_shader(s).unwrap();
    blit(&mut r, a, 0.0);

    let mask_texture = r.bitmap(mask).unwrap().texture;
    r.delete_bitmap(mask).unwrap();

    let calls = r.device().calls();
    let draw = calls.iter().position(|c| matches!(c, DeviceCall::DrawIndexed(_))).unwrap();
    let delete = calls
        .iter()
        .position(|c| *c == DeviceCall::DeleteTexture(mask_texture))
        .unwrap();
    assert!(draw < delete);
}
