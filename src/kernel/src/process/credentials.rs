/// The user identity a thread group acts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub euid: u32,
    pub suid: u32,
}

impl Credentials {
    pub const ROOT: Credentials = Credentials {
        uid: 0,
        euid: 0,
        suid: 0,
    };

    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            euid: uid,
            suid: uid,
        }
    }

    pub fn is_root(&self) -> bool {
        self.euid == 0
    }

    /// Whether a holder of `self` may send a signal to a holder of `target`.
    ///
    /// Root may signal anyone. Otherwise the real or effective user ID of
    /// the sender must match the real or saved user ID of the target.
    pub fn can_signal(&self, target: &Credentials) -> bool {
        self.is_root()
            || [self.uid, self.euid]
                .iter()
                .any(|id| *id == target.uid || *id == target.suid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_permission() {
        let alice = Credentials::new(1000);
        let bob = Credentials::new(1001);
        assert!(Credentials::ROOT.can_signal(&alice));
        assert!(alice.can_signal(&alice));
        assert!(!alice.can_signal(&bob));

        // A setuid program keeps its real ID, so its owner may signal it
        let setuid = Credentials {
            uid: 1001,
            euid: 1000,
            suid: 1000,
        };
        assert!(alice.can_signal(&setuid));
        assert!(setuid.can_signal(&bob));
        assert!(!bob.can_signal(&Credentials::ROOT));
    }
}
