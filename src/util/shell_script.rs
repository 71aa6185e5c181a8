use std::io;

/// Builder for the one-line startup scripts handed to `/bin/bash -c`.
///
/// Fragments must not contain `\n` or `\r`; they are joined with `; ` so a failing
/// fragment never prevents the next one from running.
#[derive(Debug, Default)]
pub struct ShellScript {
    parts: Vec<String>,
}

impl ShellScript {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn push(&mut self, cmd: impl Into<String>) -> &mut Self {
        self.parts.push(cmd.into());
        self
    }

    /// Change directory, ignoring failure (the mount may not be ready yet).
    pub fn cd_soft(&mut self, dir: &str) -> &mut Self {
        self.parts
            .push(format!("cd {} 2>/dev/null || true", super::shell_escape(dir)));
        self
    }

    pub fn build(&self) -> io::Result<String> {
        for (i, p) in self.parts.iter().enumerate() {
            if p.contains('\n') || p.contains('\r') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("startup script fragment {i} contains a newline"),
                ));
            }
        }
        Ok(self.parts.join("; "))
    }
}
