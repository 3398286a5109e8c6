fn main() {
    stope::main()
}
