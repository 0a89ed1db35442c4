//! Write-transaction script sources submitted to the accessor node.
//!
//! The scripts are opaque payloads from the client's point of view; only
//! their argument shapes are part of the contract here.

/// Creates the profile record for the signing account.
///
/// Idempotent on the ledger side: an account that already holds a profile
/// is left untouched and the transaction still seals.
pub const CREATE_PROFILE_SCRIPT: &str = r#"
import Profile from 0xProfile

transaction {
  prepare(account: AuthAccount) {
    if (!Profile.check(account.address)) {
      account.save(<- Profile.new(), to: Profile.privatePath)
      account.link<&Profile.Base{Profile.Public}>(Profile.publicPath, target: Profile.privatePath)
    }
  }
}
"#;

/// Rewrites all three profile fields of the signing account.
///
/// Targets a profile capability that must already be linked; submitting it
/// for an account without a profile is undefined on the ledger side, so the
/// orchestrator refuses to compose it in that state.
pub const UPDATE_PROFILE_SCRIPT: &str = r#"
import Profile from 0xProfile

transaction(name: String, color: String, info: String) {
  prepare(account: AuthAccount) {
    account
      .borrow<&Profile.Base{Profile.Owner}>(from: Profile.privatePath)!
      .setName(name)

    account
      .borrow<&Profile.Base{Profile.Owner}>(from: Profile.privatePath)!
      .setInfo(info)

    account
      .borrow<&Profile.Base{Profile.Owner}>(from: Profile.privatePath)!
      .setColor(color)
  }
}
"#;
