//! Literal content of the files written into the dashboard session.

pub const XINITRC: &str = "xset s off\nxset -dpms\nxset s noblank\nexec openbox-session\n";

pub const XINITRC_MODE: u32 = 0o644;
pub const VNCRC_MODE: u32 = 0o644;
pub const AUTOSTART_MODE: u32 = 0o644;
/// x11vnc runs as the dashboard user but appends to a log under `/var/log`.
pub const VNC_LOG_MODE: u32 = 0o666;
pub const CONFIG_DIR_MODE: u32 = 0o755;
pub const SSH_DIR_MODE: u32 = 0o700;
pub const AUTHORIZED_KEYS_MODE: u32 = 0o600;

/// Marker looked for in `rc.local` to decide whether autologin is already set up.
pub const AUTOLOGIN_MARKER: &str = "startx";

/// Images without an `rc.local` get this one.
pub const RC_LOCAL_STUB: &str = "#!/bin/sh -e\n\nexit 0\n";
pub const RC_LOCAL_MODE: u32 = 0o755;

pub const ZONEINFO_DIR: &str = "/usr/share/zoneinfo";

pub fn x11vncrc(log_path: &str) -> String {
    format!("nopw\nlogappend {log_path}\nforever\nncache 10\n")
}

/// Openbox autostart: black background, hidden cursor, the browser, then a delayed
/// full-screen toggle and a delayed VNC server.
pub fn autostart(browser_command: &str) -> String {
    format!(
        "xsetroot -solid \"#000000\" &\n\
         unclutter &\n\
         {browser_command} &\n\
         sleep 25; xdotool key F11 &\n\
         sleep 15; x11vnc &\n"
    )
}

pub fn autologin_line(dashboard_user: &str) -> String {
    format!("su - {dashboard_user} -c 'startx' &")
}

pub fn hosts_line(hostname: &str, domain: Option<&str>) -> String {
    match domain {
        Some(domain) if !domain.is_empty() => format!("127.0.1.1\t{hostname}.{domain} {hostname}"),
        _ => format!("127.0.1.1\t{hostname} {hostname}"),
    }
}

/// Insert the autologin command ahead of the final `exit 0` of an `rc.local` script.
///
/// Without an `exit 0` line the command is appended.
pub fn insert_autologin(rc_local: &str, dashboard_user: &str) -> String {
    let line = autologin_line(dashboard_user);
    let lines: Vec<&str> = rc_local.split_inclusive('\n').collect();
    let exit_at = lines
        .iter()
        .rposition(|l| l.trim_end_matches(['\n', '\r']).trim() == "exit 0");

    let mut out = String::with_capacity(rc_local.len() + line.len() + 2);
    match exit_at {
        Some(idx) => {
            for l in &lines[..idx] {
                out.push_str(l);
            }
            out.push_str(&line);
            out.push_str("\n\n");
            for l in &lines[idx..] {
                out.push_str(l);
            }
        }
        None => {
            out.push_str(rc_local);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCK_RC_LOCAL: &str = "#!/bin/sh -e\n#\n# rc.local\n\n_IP=$(hostname -I) || true\n\nexit 0\n";

    #[test]
    fn vncrc_has_fixed_directives() {
        assert_eq!(
            x11vncrc("/var/log/x11vnc"),
            "nopw\nlogappend /var/log/x11vnc\nforever\nncache 10\n"
        );
    }

    #[test]
    fn autostart_launches_browser_in_background() {
        let script = autostart("chromium");
        assert!(script.starts_with("xsetroot -solid \"#000000\" &\n"));
        assert!(script.contains("\nchromium &\n"));
        assert!(script.ends_with("sleep 15; x11vnc &\n"));
    }

    #[test]
    fn hosts_line_with_and_without_domain() {
        assert_eq!(
            hosts_line("wall", Some("example.net")),
            "127.0.1.1\twall.example.net wall"
        );
        assert_eq!(hosts_line("wall", None), "127.0.1.1\twall wall");
        assert_eq!(hosts_line("wall", Some("")), "127.0.1.1\twall wall");
    }

    #[test]
    fn autologin_goes_before_final_exit() {
        let out = insert_autologin(STOCK_RC_LOCAL, "dashboard");
        assert!(out.ends_with("su - dashboard -c 'startx' &\n\nexit 0\n"));
        assert!(out.starts_with("#!/bin/sh -e\n"));
        assert_eq!(out.matches("exit 0").count(), 1);
    }

    #[test]
    fn only_last_exit_is_used() {
        let input = "if false; then\n  exit 0\nfi\nexit 0\n";
        let out = insert_autologin(input, "dashboard");
        assert_eq!(
            out,
            "if false; then\n  exit 0\nfi\nsu - dashboard -c 'startx' &\n\nexit 0\n"
        );
    }

    #[test]
    fn autologin_appended_without_exit() {
        let out = insert_autologin("#!/bin/sh", "dashboard");
        assert_eq!(out, "#!/bin/sh\nsu - dashboard -c 'startx' &\n");
    }
}
