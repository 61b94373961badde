//! Rig document command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use skel_anim::animator::StateMotion;
use skel_anim::{AnimatorCondition, AnimatorTransition, ConditionOp, ParameterValue};

use crate::document::RigDocument;
use crate::utils::{SectionTable, format_optional, format_rotation, format_seconds, format_vec3};

#[derive(Subcommand)]
pub enum RigCommands {
    /// Display bones, clips, states and transitions of a rig document
    Info {
        /// Path to the rig document (JSON)
        file: PathBuf,

        /// Also list clip channels and events
        #[arg(short, long)]
        detailed: bool,
    },

    /// Validate the skeleton ordering and controller references
    Validate {
        /// Path to the rig document (JSON)
        file: PathBuf,
    },
}

pub fn execute(cmd: RigCommands) -> Result<()> {
    match cmd {
        RigCommands::Info { file, detailed } => handle_info(file, detailed),
        RigCommands::Validate { file } => handle_validate(file),
    }
}

fn describe_motion(doc: &RigDocument, motion: StateMotion) -> String {
    match motion {
        StateMotion::Clip(index) => match doc.clips.get(index) {
            Some(clip) => format!("clip '{}'", clip.name),
            None => format!("clip #{index} (missing)"),
        },
        StateMotion::BlendTree(index) => match doc.controller.blend_trees.get(index) {
            Some(tree) => format!("blend '{}' on {}", tree.name, tree.parameter),
            None => format!("blend tree #{index} (missing)"),
        },
    }
}

fn state_name(doc: &RigDocument, index: usize) -> String {
    doc.controller
        .states
        .get(index)
        .map_or_else(|| format!("#{index}"), |state| state.name.clone())
}

fn describe_condition(condition: &AnimatorCondition) -> String {
    let op = match condition.op {
        ConditionOp::IfTrue => return condition.parameter.clone(),
        ConditionOp::IfFalse => return format!("!{}", condition.parameter),
        ConditionOp::Greater => ">",
        ConditionOp::Less => "<",
        ConditionOp::GreaterEqual => ">=",
        ConditionOp::LessEqual => "<=",
        ConditionOp::Equal => "==",
        ConditionOp::NotEqual => "!=",
    };
    format!("{} {op} {}", condition.parameter, condition.threshold)
}

fn describe_conditions(transition: &AnimatorTransition) -> String {
    if transition.conditions.is_empty() {
        return "-".to_string();
    }
    transition
        .conditions
        .iter()
        .map(describe_condition)
        .collect::<Vec<_>>()
        .join(" && ")
}

fn describe_value(value: ParameterValue) -> String {
    match value {
        ParameterValue::Float(v) => format!("{v}"),
        ParameterValue::Int(v) => v.to_string(),
        ParameterValue::Bool(v) | ParameterValue::Trigger(v) => v.to_string(),
    }
}

fn handle_info(path: PathBuf, detailed: bool) -> Result<()> {
    let doc = RigDocument::load(&path)?;

    println!("=== Rig: {} ===", doc.display_name());

    let mut bones = SectionTable::titled(
        "Bones",
        &["Name", "Parent", "Translation", "Rotation", "Scale"],
    )
    .numbered();
    for bone in &doc.skeleton {
        bones.push([
            bone.name.clone(),
            format_optional(bone.parent.as_deref()),
            format_vec3(bone.translation),
            format_rotation(bone.rotation),
            format_vec3(bone.scale),
        ]);
    }
    bones.print();

    let mut clips = SectionTable::titled(
        "Clips",
        &["Name", "Duration", "Ticks/s", "Channels", "Events"],
    )
    .numbered();
    for clip in &doc.clips {
        let seconds = if clip.ticks_per_second > 0.0 {
            clip.duration_ticks / clip.ticks_per_second
        } else {
            0.0
        };
        clips.push([
            clip.name.clone(),
            format_seconds(seconds),
            format!("{}", clip.ticks_per_second),
            clip.channels.len().to_string(),
            clip.events.len().to_string(),
        ]);
    }
    clips.print();

    if detailed {
        for clip in &doc.clips {
            let mut channels = SectionTable::titled(
                format!("Clip '{}' channels", clip.name),
                &["Bone", "Position keys", "Rotation keys", "Scale keys"],
            );
            for channel in &clip.channels {
                channels.push([
                    channel.bone_name.clone(),
                    channel.position_keys.len().to_string(),
                    channel.rotation_keys.len().to_string(),
                    channel.scale_keys.len().to_string(),
                ]);
            }
            channels.print();
            for event in &clip.events {
                println!("  event '{}' at {}", event.name, format_seconds(event.time));
            }
        }
    }

    let controller = &doc.controller;
    let mut parameters = SectionTable::titled("Parameters", &["Name", "Type", "Default"]);
    for parameter in &controller.parameters {
        parameters.push([
            parameter.name.clone(),
            format!("{:?}", parameter.kind()),
            describe_value(parameter.value),
        ]);
    }
    parameters.print();

    let mut states =
        SectionTable::titled("States", &["Name", "Motion", "Speed", "Loop"]).numbered();
    for state in &controller.states {
        states.push([
            state.name.clone(),
            describe_motion(&doc, state.motion),
            format!("{}", state.speed),
            state.looping.to_string(),
        ]);
    }
    states.print();

    let mut transitions = SectionTable::titled(
        "Transitions",
        &["From", "To", "Duration", "Exit time", "Conditions"],
    );
    for transition in &controller.transitions {
        let duration = if transition.fixed_duration {
            format_seconds(transition.duration)
        } else {
            format!("{:.0}% of source", transition.duration * 100.0)
        };
        transitions.push([
            transition
                .from
                .map_or_else(|| "Any".to_string(), |from| state_name(&doc, from)),
            state_name(&doc, transition.to),
            duration,
            format_optional(transition.exit_time),
            describe_conditions(transition),
        ]);
    }
    transitions.print();

    if let Some(ik) = &doc.ik {
        println!(
            "\nIK: {} -> {} -> {}, target {} ({:?}), weight {:.2}{}",
            ik.root_bone,
            ik.mid_bone,
            ik.end_bone,
            format_vec3(ik.target),
            ik.target_space,
            ik.weight(),
            if ik.enabled { "" } else { " (disabled)" }
        );
    }

    Ok(())
}

fn handle_validate(path: PathBuf) -> Result<()> {
    println!("Validating rig: {}", path.display());

    let doc = RigDocument::load(&path)?;
    doc.validate()
        .with_context(|| format!("Rig '{}' failed validation", doc.display_name()))?;

    println!(
        "✓ Rig is valid: {} bones, {} clips, {} states, {} transitions",
        doc.skeleton.len(),
        doc.clips.len(),
        doc.controller.states.len(),
        doc.controller.transitions.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_condition() {
        let condition = AnimatorCondition::new("Speed", ConditionOp::Greater, 0.1);
        assert_eq!(describe_condition(&condition), "Speed > 0.1");
        assert_eq!(describe_condition(&AnimatorCondition::if_false("Grounded")), "!Grounded");
    }

    #[test]
    fn test_describe_conditions_joined() {
        let transition = AnimatorTransition::from_any(1)
            .with_condition(AnimatorCondition::if_true("Jump"))
            .with_condition(AnimatorCondition::new("Speed", ConditionOp::Less, 2.0));
        assert_eq!(describe_conditions(&transition), "Jump && Speed < 2");
        assert_eq!(describe_conditions(&AnimatorTransition::from_any(0)), "-");
    }
}
