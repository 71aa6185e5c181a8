/*!
Environment auto-detection.

- detect_from_command: match the first command word against keyword sets
- detect_from_markers: look for project marker files in a directory (shell commands only)
- DetectionRules: the keyword and marker lists as data, extendable from the config file
*/
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    Alpine,
    Node,
    Python,
}

impl EnvKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKind::Alpine => "alpine",
            EnvKind::Node => "node",
            EnvKind::Python => "python",
        }
    }

    /// Display name used in the auto-detection announcement.
    pub fn title(&self) -> &'static str {
        match self {
            EnvKind::Alpine => "Alpine",
            EnvKind::Node => "Node",
            EnvKind::Python => "Python",
        }
    }
}

const NODE_COMMANDS: &[&str] = &[
    "npm",
    "npx",
    "yarn",
    "pnpm",
    "node",
    "nodejs",
    "webpack",
    "vite",
    "next",
    "nuxt",
    "gatsby",
    "react-scripts",
    "vue-cli-service",
    "ng",
    "angular",
    "tsc",
    "ts-node",
    "eslint",
    "prettier",
    "jest",
];

const PYTHON_COMMANDS: &[&str] = &[
    "python",
    "python3",
    "pip",
    "pip3",
    "pipenv",
    "poetry",
    "pytest",
    "black",
    "flake8",
    "mypy",
    "pylint",
    "django-admin",
    "flask",
    "gunicorn",
    "uvicorn",
    "jupyter",
    "ipython",
    "conda",
    "mamba",
];

const NODE_MARKERS: &[&str] = &["package.json", "yarn.lock", "pnpm-lock.yaml"];

const PYTHON_MARKERS: &[&str] = &[
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "Pipfile",
    "poetry.lock",
];

/// Commands that trigger marker-file inspection of the working directory.
const SHELL_COMMANDS: &[&str] = &["bash", "sh", "zsh"];

/// Extra detection entries read from the `detection` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOverrides {
    pub node_commands: Vec<String>,
    pub python_commands: Vec<String>,
    pub node_markers: Vec<String>,
    pub python_markers: Vec<String>,
}

impl DetectionOverrides {
    pub fn is_empty(&self) -> bool {
        self.node_commands.is_empty()
            && self.python_commands.is_empty()
            && self.node_markers.is_empty()
            && self.python_markers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRules {
    node_commands: Vec<String>,
    python_commands: Vec<String>,
    node_markers: Vec<String>,
    python_markers: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for DetectionRules {
    fn default() -> Self {
        DetectionRules {
            node_commands: owned(NODE_COMMANDS),
            python_commands: owned(PYTHON_COMMANDS),
            node_markers: owned(NODE_MARKERS),
            python_markers: owned(PYTHON_MARKERS),
        }
    }
}

impl DetectionRules {
    /// Built-in rules extended (never replaced) by `extra`.
    pub fn with_overrides(extra: &DetectionOverrides) -> Self {
        let mut rules = Self::default();
        let add = |dst: &mut Vec<String>, src: &[String], lower: bool| {
            for s in src {
                let s = s.trim();
                let s = if lower {
                    s.to_ascii_lowercase()
                } else {
                    s.to_string()
                };
                if !s.is_empty() && !dst.contains(&s) {
                    dst.push(s);
                }
            }
        };
        add(&mut rules.node_commands, &extra.node_commands, true);
        add(&mut rules.python_commands, &extra.python_commands, true);
        add(&mut rules.node_markers, &extra.node_markers, false);
        add(&mut rules.python_markers, &extra.python_markers, false);
        rules
    }

    /// Case-insensitive keyword match on the first command word.
    pub fn detect_from_command(&self, first: &str) -> Option<EnvKind> {
        let first = first.to_ascii_lowercase();
        if self.node_commands.iter().any(|c| *c == first) {
            Some(EnvKind::Node)
        } else if self.python_commands.iter().any(|c| *c == first) {
            Some(EnvKind::Python)
        } else {
            None
        }
    }

    /// Node markers are checked before Python markers.
    pub fn detect_from_markers(&self, dir: &Path) -> Option<EnvKind> {
        if self.node_markers.iter().any(|m| dir.join(m).exists()) {
            Some(EnvKind::Node)
        } else if self.python_markers.iter().any(|m| dir.join(m).exists()) {
            Some(EnvKind::Python)
        } else {
            None
        }
    }

    /// Environment for `command`, or None when nothing matched (callers fall back to
    /// Alpine). Marker files are only consulted when the command is a plain shell.
    pub fn detect(&self, command: &[String], cwd: &Path) -> Option<EnvKind> {
        let first = command.first()?;
        if let Some(kind) = self.detect_from_command(first) {
            return Some(kind);
        }
        let lower = first.to_ascii_lowercase();
        if SHELL_COMMANDS.contains(&lower.as_str()) {
            return self.detect_from_markers(cwd);
        }
        None
    }
}
