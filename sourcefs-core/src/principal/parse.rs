//! Parsers for OS identity-command output.

use super::{Group, User};

/// Parse the output of Unix `id(1)`:
///
/// `uid=1000(alice) gid=1000(alice) groups=1000(alice),4(adm),10(wheel)`
pub fn parse_unix_id(text: &str) -> Option<User> {
    let mut user: Option<User> = None;
    let mut primary: Option<Group> = None;
    let mut secondary: Vec<Group> = Vec::new();

    for part in text.split_whitespace() {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key {
            "uid" => {
                let (id, name) = parse_entry(value)?;
                user = Some(User::new(id, name));
            }
            "gid" => {
                if let Some((id, name)) = parse_entry(value) {
                    primary = Some(Group::new(id, name));
                }
            }
            "groups" => {
                for entry in value.split(',') {
                    if let Some((id, name)) = parse_entry(entry) {
                        secondary.push(Group::new(id, name));
                    }
                }
            }
            _ => {}
        }
    }

    let mut user = user?;
    if let Some(group) = primary {
        user.set_group(group);
    }
    for group in secondary {
        user.add_group(group);
    }
    Some(user)
}

/// One `1000(alice)` entry from an `id` field.
fn parse_entry(entry: &str) -> Option<(u32, String)> {
    let open = entry.find('(')?;
    let close = entry.rfind(')')?;
    if close <= open {
        return None;
    }
    let id = entry[..open].trim().parse().ok()?;
    let name = entry[open + 1..close].trim();
    if name.is_empty() {
        return None;
    }
    Some((id, name.to_string()))
}

/// Parse the output of Windows `whoami /user /groups /fo list`.
///
/// `User Name:` carries `DOMAIN\name`; each `Group Name:` line contributes a
/// membership. Lines tagged `Label` are integrity levels, not groups. Group
/// ids are assigned in first-seen order since the listing has no numeric id.
pub fn parse_windows_whoami(text: &str) -> Option<User> {
    let mut user: Option<User> = None;
    let mut next_gid = 0u32;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("User Name:") {
            let name = rest.trim().rsplit('\\').next()?.trim();
            if !name.is_empty() {
                user = Some(User::new(0, name));
            }
        } else if let Some(rest) = line.strip_prefix("Group Name:") {
            if line.contains("Label") {
                continue;
            }
            let Some(user) = user.as_mut() else {
                continue;
            };
            let name = rest.trim().rsplit('\\').next().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            user.add_group(Group::new(next_gid, name));
            next_gid += 1;
        }
    }

    user
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_id_output() {
        let out = "uid=1000(ec2-user) gid=1000(ec2-user) groups=1000(ec2-user),4(adm),10(wheel),190(systemd-journal)\n";
        let user = parse_unix_id(out).unwrap();
        assert_eq!(user.id(), 1000);
        assert_eq!(user.name(), "ec2-user");
        assert_eq!(user.group().id(), 1000);
        assert!(user.has_group(4));
        assert!(user.has_group_named("wheel"));
        assert!(!user.has_group_named("staff"));
    }

    #[test]
    fn parses_macos_id_output() {
        let out = "uid=503(Jimmie) gid=20(staff) groups=20(staff),12(everyone),61(localaccounts)";
        let user = parse_unix_id(out).unwrap();
        assert_eq!(user.id(), 503);
        assert_eq!(user.group().name(), "staff");
        assert!(user.has_group(12));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_unix_id("").is_none());
        assert!(parse_unix_id("no identity here").is_none());
    }

    #[test]
    fn parses_whoami_list_output() {
        let out = "\
USER INFORMATION
----------------
User Name: windowslaptop\\tony
SID:       S-1-5-21-1-2-3-1007

GROUP INFORMATION
-----------------
Group Name: Everyone
Type:       Well-known group
Group Name: BUILTIN\\Users
Type:       Alias
Group Name: Mandatory Label\\Medium Label
Type:       Label
";
        let user = parse_windows_whoami(out).unwrap();
        assert_eq!(user.name(), "tony");
        assert!(user.has_group_named("Everyone"));
        assert!(user.has_group_named("Users"));
        assert!(!user.has_group_named("Medium Label"));
    }
}
