//! Inline Dockerfile for derived session images (fed to `build -t <name> -`).

/// Dockerfile text layering bash (and optionally tmux) on top of `base`.
///
/// Alpine-based tags install with `apk`; everything else is assumed Debian-family, where
/// bash already exists and tmux comes from `apt-get`.
pub fn render(base: &str, with_tmux: bool) -> String {
    let alpine = base.contains("alpine");
    let install = match (alpine, with_tmux) {
        (true, true) => "RUN apk add --no-cache bash tmux",
        (true, false) => "RUN apk add --no-cache bash",
        (false, true) => {
            "RUN apt-get update && apt-get install -y bash tmux && rm -rf /var/lib/apt/lists/*"
        }
        (false, false) => "# bash already available",
    };
    format!("FROM {base}\n{install}\nWORKDIR /root\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpine_installs_bash() {
        let df = render("alpine:latest", false);
        assert_eq!(
            df,
            "FROM alpine:latest\nRUN apk add --no-cache bash\nWORKDIR /root\n"
        );
        assert!(render("node:18-alpine", true).contains("apk add --no-cache bash tmux"));
    }

    #[test]
    fn test_debian_family_only_installs_for_tmux() {
        let plain = render("python:3.9", false);
        assert!(!plain.contains("RUN "));
        assert!(plain.starts_with("FROM python:3.9\n"));
        let tmux = render("node:lts", true);
        assert!(tmux.contains("apt-get install -y bash tmux"));
        assert!(tmux.ends_with("WORKDIR /root\n"));
    }
}
