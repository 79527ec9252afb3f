//! Crowd control: stun, shock, knockbacks and death.
//!
//! Stun and the knockbacks occupy the action slot, so nothing weaker can start
//! while they run. Their recovery timers call the end handler if the effect is
//! still current; if something stronger replaced it, the timer only clears the
//! leftover flags. Shock is not an action.

use rand::Rng;

use crate::net::Notification;
use crate::status::StatusFlags;
use crate::timer::TimerEvent;

use super::CombatState;

impl CombatState {
    /// Clears the flags of whatever the character was doing.
    fn interrupt_flags(&mut self) {
        self.status.remove(StatusFlags::INTERRUPTIBLE);
    }

    pub(super) fn play_stun(&mut self) {
        self.outbox.broadcast(Notification::StopAllMontages);
        self.interrupt_flags();
        self.status.insert(StatusFlags::STUNNED);
        self.outbox.broadcast(Notification::StunVisual { active: true });
        self.outbox.owning_client(Notification::SkillBan { banned: true });
        self.outbox.owning_client(Notification::StunIndicator { active: true });

        if let Some(previous) = self.stun_timer.take() {
            self.timers.cancel(previous);
        }
        let duration = f64::from(self.stun_duration);
        self.stun_timer = Some(self.timers.schedule(duration, TimerEvent::StunExpired));
        tracing::debug!(owner = %self.id, duration, "stunned");
    }

    pub(super) fn recover_stun(&mut self) {
        if let Some(token) = self.stun_timer.take() {
            self.timers.cancel(token);
        }
        if !self.status.contains(StatusFlags::STUNNED) {
            return;
        }
        self.status.remove(StatusFlags::STUNNED);
        self.outbox.broadcast(Notification::StunVisual { active: false });
        self.outbox.owning_client(Notification::SkillBan { banned: false });
        self.outbox.owning_client(Notification::StunIndicator { active: false });
    }

    pub(super) fn shock(&mut self, duration: f32) {
        self.status.insert(StatusFlags::SHOCKED);
        self.outbox.broadcast(Notification::ShockVisual { active: true });
        self.outbox.owning_client(Notification::SkillBan { banned: true });

        if let Some(previous) = self.shock_timer.take() {
            self.timers.cancel(previous);
        }
        self.shock_timer = Some(self.timers.schedule(f64::from(duration), TimerEvent::ShockExpired));
    }

    pub(super) fn recover_shock(&mut self) {
        self.shock_timer = None;
        if !self.status.contains(StatusFlags::SHOCKED) {
            return;
        }
        self.status.remove(StatusFlags::SHOCKED);
        self.outbox.broadcast(Notification::ShockVisual { active: false });
        self.outbox.owning_client(Notification::SkillBan { banned: false });
    }

    pub(super) fn play_knockback(&mut self) {
        self.outbox.broadcast(Notification::StopAllMontages);
        self.interrupt_flags();
        self.status.insert(StatusFlags::KNOCKBACKED);

        let variants = self.config.crowd_control.knockback_variants.max(1);
        let variant = self.rng.gen_range(0..variants);
        self.knockback_variant = variant;
        let montage = usize::try_from(variant)
            .ok()
            .and_then(|index| self.montages.knockback.get(index))
            .cloned();
        match montage {
            Some(montage) => self.outbox.broadcast(Notification::PlayMontage { montage, rate: 1.0 }),
            None => tracing::warn!(owner = %self.id, variant, "missing knockback montage"),
        }

        if let Some(previous) = self.knockback_timer.take() {
            self.timers.cancel(previous);
        }
        let reset = f64::from(self.config.crowd_control.knockback_reset);
        self.knockback_timer = Some(self.timers.schedule(reset, TimerEvent::KnockbackRecovered));
    }

    pub(super) fn recover_knockback(&mut self) {
        if let Some(token) = self.knockback_timer.take() {
            self.timers.cancel(token);
        }
        if !self.status.contains(StatusFlags::KNOCKBACKED) {
            return;
        }
        self.outbox.owning_client(Notification::LookLock { locked: false });
        self.status.remove(StatusFlags::KNOCKBACKED);
    }

    pub(super) fn play_big_knockback(&mut self) {
        self.outbox.broadcast(Notification::StopAllMontages);
        self.outbox.owning_client(Notification::LookLock { locked: true });
        self.status.insert(StatusFlags::BIG_KNOCKBACKED);
        self.interrupt_flags();
        if let Some(montage) = self.montages.big_knockback.clone() {
            self.outbox.broadcast(Notification::PlayMontage { montage, rate: 1.0 });
        }

        if let Some(previous) = self.big_knockback_timer.take() {
            self.timers.cancel(previous);
        }
        let reset = f64::from(self.config.crowd_control.big_knockback_reset);
        self.big_knockback_timer =
            Some(self.timers.schedule(reset, TimerEvent::BigKnockbackRecovered));
    }

    pub(super) fn recover_big_knockback(&mut self) {
        if let Some(token) = self.big_knockback_timer.take() {
            self.timers.cancel(token);
        }
        if !self.status.contains(StatusFlags::BIG_KNOCKBACKED) {
            return;
        }
        self.outbox.owning_client(Notification::LookLock { locked: false });
        self.interrupt_flags();
        self.status.remove(StatusFlags::BIG_KNOCKBACKED);
    }

    pub(super) fn play_dead(&mut self) {
        self.outbox.broadcast(Notification::StopAllMontages);
        self.interrupt_flags();
        self.status.insert(StatusFlags::DEAD);
        tracing::debug!(owner = %self.id, "died");
    }
}
