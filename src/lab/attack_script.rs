use crate::attack::{hijack_vtysh_args, AttackOrchestrator};

const CONTINUATION_INDENT: &str = "      ";

/// `attack.sh`, running the hijack of `orchestrator` by hand on the hacker's router.
pub fn attack_script(orchestrator: &AttackOrchestrator) -> Vec<String> {
    let prefix = orchestrator.victim_prefix();
    let loopback = orchestrator
        .hijack_commands()
        .into_iter()
        .next()
        .map(|argv| argv.join(" "))
        .unwrap_or_default();

    let args = hijack_vtysh_args(orchestrator.hacker(), &prefix);
    let commands: Vec<&String> = args.iter().skip(1).step_by(2).collect();

    let mut lines = vec!["#!/bin/bash".to_string(), loopback];
    for (i, command) in commands.iter().enumerate() {
        let lead = if i == 0 { "vtysh" } else { CONTINUATION_INDENT };
        let tail = if i + 1 < commands.len() { " \\" } else { "" };
        lines.push(format!("{} -c \"{}\"{}", lead, command, tail));
    }
    lines
}
