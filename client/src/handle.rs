use std::cell::RefCell;
use std::rc::Rc;

use banana_shared::{AspectRatio, CanvasScene, Tool};

use crate::actions;
use crate::session::AppState;

type Listener = Rc<dyn Fn(&AppState)>;

/// Shared controller for the editor. Toolbar code holds a clone instead of
/// reaching into globals; every mutation notifies the subscribed views.
#[derive(Clone)]
pub struct CanvasHandle {
    state: Rc<RefCell<AppState>>,
    listeners: Rc<RefCell<Vec<Listener>>>,
}

impl CanvasHandle {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&AppState) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Runs `f` and then notifies listeners once the borrow is released.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let result = f(&mut self.state.borrow_mut());
        self.notify();
        result
    }

    /// Mutation without a view refresh, for high-frequency pointer moves.
    pub fn update_quiet<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub fn notify(&self) {
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        let state = self.state.borrow();
        for listener in listeners {
            listener(&state);
        }
    }

    pub fn undo(&self) -> bool {
        self.update(|state| actions::undo(&mut state.canvas))
    }

    pub fn redo(&self) -> bool {
        self.update(|state| actions::redo(&mut state.canvas))
    }

    pub fn can_undo(&self) -> bool {
        self.read(|state| state.canvas.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.read(|state| state.canvas.can_redo())
    }

    pub fn clear(&self) {
        self.update(|state| actions::clear(&mut state.canvas));
    }

    pub fn delete_selected(&self) -> bool {
        self.update(|state| {
            let Some(id) = state.canvas.selected_image.clone() else {
                return false;
            };
            if state.images.uploads().iter().any(|image| image.id == id) {
                state.remove_upload(&id)
            } else {
                actions::delete_image(&mut state.canvas, &id)
            }
        })
    }

    pub fn set_tool(&self, tool: Tool) {
        self.update(|state| actions::set_tool(&mut state.canvas, tool));
    }

    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.update(|state| actions::set_aspect_ratio(&mut state.canvas, ratio));
    }

    pub fn export_scene(&self) -> CanvasScene {
        self.read(|state| state.canvas.scene())
    }
}
