// Common test fixtures for integration tests
//
// This module provides the sample class hierarchy (Vehicle, Car, Elephant
// and the Moveable/Sellable interfaces) plus the small fixtures used by the
// lifecycle, inheritance and event tests.

#![allow(dead_code)]

use classy::{Behavior, Derived, Event, Method, Object, class, implements, interface, raise};
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Observations
// ============================================================================

/// Something an event handler saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    NeedFuel(i32),
    CarMoved(i32),
    ElephantMoved(i32),
    EventTriggered,
}

thread_local! {
    static OBSERVED: RefCell<Vec<Observation>> = const { RefCell::new(Vec::new()) };
}

/// Records an observation on the current test thread.
pub fn observe(observation: Observation) {
    OBSERVED.with(|seen| seen.borrow_mut().push(observation));
}

/// Returns and clears the observations of the current test thread.
pub fn take_observations() -> Vec<Observation> {
    OBSERVED.with(|seen| seen.take())
}

// ============================================================================
// Instance counters
// ============================================================================

pub static UNIQUE_CREATED: AtomicUsize = AtomicUsize::new(0);
pub static UNIQUE_DESTROYED: AtomicUsize = AtomicUsize::new(0);
pub static TOTAL_CREATED: AtomicUsize = AtomicUsize::new(0);
pub static TOTAL_DESTROYED: AtomicUsize = AtomicUsize::new(0);

fn count_created(is_base: bool) {
    if !is_base {
        UNIQUE_CREATED.fetch_add(1, Ordering::SeqCst);
    }
    TOTAL_CREATED.fetch_add(1, Ordering::SeqCst);
}

fn count_destroyed(is_base: bool) {
    if !is_base {
        UNIQUE_DESTROYED.fetch_add(1, Ordering::SeqCst);
    }
    TOTAL_DESTROYED.fetch_add(1, Ordering::SeqCst);
}

// ============================================================================
// Interfaces
// ============================================================================

interface! {
    /// Anything with a position that can move.
    pub interface Moveable {
        data position: i32;
        event on_move(i32);
        fn move_(speed: i32, distance: i32) -> ();
    }
}

interface! {
    /// Anything with an id and a price.
    pub interface Sellable {
        data id: i32;
        fn estimate_price() -> i32;
    }
}

// ============================================================================
// Vehicle
// ============================================================================

class! {
    pub struct Vehicle: Object {
        pub id: i32,
        pub position: i32,
        pub on_move: Event<Vehicle, (i32,)>,
        pub estimate_price: Method<Vehicle, (), i32>,
        pub move_: Method<Vehicle, (i32, i32)>,
    }
}

pub fn vehicle_estimate_price(_: &mut Vehicle, (): ()) -> i32 {
    1000
}

pub fn vehicle_move(vehicle: &mut Vehicle, (_speed, distance): (i32, i32)) {
    vehicle.position += distance;
    raise!(vehicle, on_move(distance));
}

impl Behavior for Vehicle {
    type Args = ();

    fn install(&mut self) {
        Method::install(self, |v| &mut v.estimate_price, vehicle_estimate_price);
        Method::install(self, |v| &mut v.move_, vehicle_move);
    }

    fn init(&mut self, is_base: bool, (): ()) {
        count_created(is_base);
    }

    fn fini(&mut self, is_base: bool) {
        count_destroyed(is_base);
    }
}

implements!(Vehicle: Sellable {
    data id;
    fn estimate_price;
});

implements!(Vehicle: Moveable {
    data position;
    event on_move;
    fn move_;
});

// ============================================================================
// Car
// ============================================================================

/// Distance a full tank lasts.
pub const TANK_RANGE: i32 = 400;

class! {
    pub struct Car: Vehicle {
        pub km_total: i32,
        pub km_since_last_fuel: i32,
        pub on_need_fuel: Event<Car, (i32,)>,
        pub park: Method<Car, ()>,
    }
}

pub fn car_estimate_price(_: &mut Car, (): ()) -> i32 {
    15000
}

pub fn car_move(car: &mut Car, (speed, distance): (i32, i32)) {
    vehicle_move(car, (speed, distance));
    car.km_total += distance;
    car.km_since_last_fuel += distance;

    let km_to_collapse = TANK_RANGE - car.km_since_last_fuel;
    if km_to_collapse < 100 {
        raise!(car, on_need_fuel(km_to_collapse));
    }
}

pub fn car_park(car: &mut Car, (): ()) {
    car.position = 0;
}

impl Behavior for Car {
    type Args = (i32,);

    fn install(&mut self) {
        Method::install(self, |c| &mut c.estimate_price, car_estimate_price);
        Method::install(self, |c| &mut c.move_, car_move);
        Method::install(self, |c| &mut c.park, car_park);
    }

    fn init(&mut self, is_base: bool, (km_total_when_bought,): (i32,)) {
        self.init_base(());
        self.position = 0;
        self.km_total = km_total_when_bought;
        self.km_since_last_fuel = 0;
        count_created(is_base);
    }

    fn fini(&mut self, is_base: bool) {
        count_destroyed(is_base);
    }
}

pub fn car_needs_fuel(_: &mut Car, (km_to_collapse,): (i32,)) {
    observe(Observation::NeedFuel(km_to_collapse));
}

pub fn car_moved(_: &mut Car, (distance,): (i32,)) {
    observe(Observation::CarMoved(distance));
}

// ============================================================================
// Elephant
// ============================================================================

class! {
    pub struct Elephant: Object {
        pub position: i32,
        pub on_move: Event<Elephant, (i32,)>,
        pub move_: Method<Elephant, (i32, i32)>,
    }
}

pub fn elephant_move(elephant: &mut Elephant, (_speed, distance): (i32, i32)) {
    elephant.position += distance;
}

impl Behavior for Elephant {
    type Args = ();

    fn install(&mut self) {
        Method::install(self, |e| &mut e.move_, elephant_move);
    }

    fn init(&mut self, is_base: bool, (): ()) {
        count_created(is_base);
    }

    fn fini(&mut self, is_base: bool) {
        count_destroyed(is_base);
    }
}

implements!(Elephant: Moveable {
    data position;
    event on_move;
    fn move_;
});

pub fn elephant_moved(_: &mut Elephant, (distance,): (i32,)) {
    observe(Observation::ElephantMoved(distance));
}

/// Swaps the positions of two moveables and reports the distance to both.
pub fn swap_positions(mut first: Moveable<'_>, mut second: Moveable<'_>) {
    let distance = (*first.position() - *second.position()).abs();
    std::mem::swap(first.position(), second.position());
    first.on_move().fire((distance,));
    second.on_move().fire((distance,));
}

// ============================================================================
// TestObject
// ============================================================================

class! {
    pub struct TestObject: Object {
        pub value: i32,
        pub get_value: Method<TestObject, (), i32>,
        pub set_value: Method<TestObject, (i32,)>,
    }
}

fn test_object_get_value(object: &mut TestObject, (): ()) -> i32 {
    object.value
}

fn test_object_set_value(object: &mut TestObject, (value,): (i32,)) {
    object.value = value;
}

impl Behavior for TestObject {
    type Args = (i32,);

    fn install(&mut self) {
        Method::install(self, |t| &mut t.get_value, test_object_get_value);
        Method::install(self, |t| &mut t.set_value, test_object_set_value);
    }

    fn init(&mut self, _is_base: bool, (initial,): (i32,)) {
        self.value = initial;
    }
}

// ============================================================================
// BaseClass / DerivedClass
// ============================================================================

class! {
    pub struct BaseClass: Object {
        pub base_value: i32,
        pub get_base_value: Method<BaseClass, (), i32>,
        pub get_overridable_value: Method<BaseClass, (), i32>,
        pub get_incremental_value: Method<BaseClass, (), i32>,
    }
}

fn base_get_base_value(base: &mut BaseClass, (): ()) -> i32 {
    base.base_value
}

fn base_get_overridable_value(_: &mut BaseClass, (): ()) -> i32 {
    1
}

pub fn base_get_incremental_value(_: &mut BaseClass, (): ()) -> i32 {
    1
}

impl Behavior for BaseClass {
    type Args = (i32,);

    fn install(&mut self) {
        Method::install(self, |b| &mut b.get_base_value, base_get_base_value);
        Method::install(self, |b| &mut b.get_overridable_value, base_get_overridable_value);
        Method::install(self, |b| &mut b.get_incremental_value, base_get_incremental_value);
    }

    fn init(&mut self, _is_base: bool, (base_initial,): (i32,)) {
        self.base_value = base_initial;
    }
}

class! {
    pub struct DerivedClass: BaseClass {
        pub derived_value: i32,
        pub get_derived_value: Method<DerivedClass, (), i32>,
    }
}

fn derived_get_derived_value(derived: &mut DerivedClass, (): ()) -> i32 {
    derived.derived_value
}

fn derived_get_overridable_value(_: &mut DerivedClass, (): ()) -> i32 {
    2
}

fn derived_get_incremental_value(derived: &mut DerivedClass, (): ()) -> i32 {
    base_get_incremental_value(derived, ()) + 2
}

impl Behavior for DerivedClass {
    type Args = (i32, i32);

    fn install(&mut self) {
        Method::install(self, |d| &mut d.get_derived_value, derived_get_derived_value);
        Method::install(self, |d| &mut d.get_overridable_value, derived_get_overridable_value);
        Method::install(self, |d| &mut d.get_incremental_value, derived_get_incremental_value);
    }

    fn init(&mut self, _is_base: bool, (base_initial, derived_initial): (i32, i32)) {
        self.init_base((base_initial,));
        self.derived_value = derived_initial;
    }
}

// ============================================================================
// Printables
// ============================================================================

interface! {
    pub interface Printable {
        fn print() -> String;
    }
}

class! {
    pub struct BasePrintable: Object {
        pub base_num: i32,
        pub print: Method<BasePrintable, (), String>,
    }
}

fn base_printable_print(printable: &mut BasePrintable, (): ()) -> String {
    format!("BasePrintable number: {}", printable.base_num)
}

impl Behavior for BasePrintable {
    type Args = (i32,);

    fn install(&mut self) {
        Method::install(self, |p| &mut p.print, base_printable_print);
    }

    fn init(&mut self, _is_base: bool, (num,): (i32,)) {
        self.base_num = num;
    }
}

implements!(BasePrintable: Printable {
    fn print;
});

class! {
    pub struct DerivedPrintable: BasePrintable {
        pub derived_num: i32,
    }
}

fn derived_printable_print(printable: &mut DerivedPrintable, (): ()) -> String {
    format!(
        "DerivedPrintable numbers: {} and {}",
        printable.base_num, printable.derived_num
    )
}

impl Behavior for DerivedPrintable {
    type Args = (i32, i32);

    fn install(&mut self) {
        Method::install(self, |p| &mut p.print, derived_printable_print);
    }

    fn init(&mut self, _is_base: bool, (base_num, derived_num): (i32, i32)) {
        self.init_base((base_num,));
        self.derived_num = derived_num;
    }
}

// ============================================================================
// EventClass
// ============================================================================

class! {
    pub struct EventClass: Object {
        pub on_event_triggered: Event<EventClass, ()>,
    }
}

impl Behavior for EventClass {
    type Args = ();

    fn init(&mut self, _is_base: bool, (): ()) {}
}

pub fn event_triggered(_: &mut EventClass, (): ()) {
    observe(Observation::EventTriggered);
}

// ============================================================================
// AutoDestruct
// ============================================================================

pub static AUTO_DESTRUCT_CALLS: AtomicUsize = AtomicUsize::new(0);

class! {
    pub struct AutoDestruct: Object {}
}

impl Behavior for AutoDestruct {
    type Args = ();

    fn init(&mut self, _is_base: bool, (): ()) {}

    fn fini(&mut self, _is_base: bool) {
        AUTO_DESTRUCT_CALLS.fetch_add(1, Ordering::SeqCst);
    }
}
