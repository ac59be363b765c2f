use crate::commands::Out;
use crate::{Config, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// A configured account as shown by `cash accounts`. The token is masked.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct AccountSummary {
    pub name: String,
    pub token: String,
    pub nicknames: BTreeMap<String, String>,
}

/// Shows all but the last four characters of a token as `*`.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let keep = chars.len().min(4);
    let hidden = chars.len() - keep;
    "*".repeat(hidden) + &chars[hidden..].iter().collect::<String>()
}

/// Lists the accounts in the config file.
pub async fn accounts(config: &Config) -> Result<Out<Vec<AccountSummary>>> {
    let summaries: Vec<AccountSummary> = config
        .accounts()
        .iter()
        .map(|a| AccountSummary {
            name: a.name.clone(),
            token: mask(&a.token),
            nicknames: a.nicknames.clone(),
        })
        .collect();

    if summaries.is_empty() {
        return Ok(Out::new("No accounts configured", summaries));
    }

    let mut output = String::from("name\ttoken\tnicknames\n");
    for s in &summaries {
        let nicknames = s
            .nicknames
            .iter()
            .map(|(mask, nick)| format!("{mask}={nick}"))
            .collect::<Vec<_>>()
            .join(",");
        output.push_str(&format!("{}\t{}\t{nicknames}\n", s.name, s.token));
    }
    Ok(Out::new(format!("{} accounts configured", summaries.len()), summaries).with_output(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::test::TestEnv;

    #[test]
    fn test_mask() {
        assert_eq!(mask("access-sandbox-1234"), "***************1234");
        assert_eq!(mask("abc"), "abc");
        assert_eq!(mask(""), "");
    }

    #[tokio::test]
    async fn test_accounts() {
        let mut env = TestEnv::new().await;
        let out = accounts(&env.config()).await.unwrap();
        assert_eq!(out.message(), "No accounts configured");
        assert!(out.output().is_none());

        env.edit(|f| {
            f.accounts.push(AccountConfig {
                name: "visa".to_string(),
                token: "access-visa-9876".to_string(),
                nicknames: BTreeMap::from([
                    ("1234".to_string(), "pat".to_string()),
                    ("5678".to_string(), "sam".to_string()),
                ]),
            });
        })
        .await;
        let out = accounts(&env.config()).await.unwrap();
        assert_eq!(out.message(), "1 accounts configured");
        assert_eq!(
            out.output().unwrap(),
            "name\ttoken\tnicknames\nvisa\t************9876\t1234=pat,5678=sam\n"
        );
        assert_eq!(out.structure().unwrap()[0].token, "************9876");
    }
}
